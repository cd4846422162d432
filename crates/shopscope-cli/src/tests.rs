use super::*;

#[test]
fn parses_scrape_with_defaults() {
    let cli = Cli::try_parse_from([
        "shopscope-cli",
        "scrape",
        "https://www.etsy.com/listing/1/mug",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Commands::Scrape {
            url,
            strategy,
            no_tags,
            skip_shop_about,
        } => {
            assert_eq!(url, "https://www.etsy.com/listing/1/mug");
            assert!(strategy.is_none());
            assert!(!no_tags);
            assert!(!skip_shop_about);
        }
        Commands::Proxies { .. } => panic!("expected scrape command"),
    }
}

#[test]
fn parses_scrape_flags() {
    let cli = Cli::try_parse_from([
        "shopscope-cli",
        "scrape",
        "https://www.etsy.com/listing/1/mug",
        "--strategy",
        "browser",
        "--no-tags",
        "--skip-shop-about",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Scrape {
            strategy: Some(StrategyArg::Browser),
            no_tags: true,
            skip_shop_about: true,
            ..
        }
    ));
}

#[test]
fn rejects_unknown_strategy() {
    let result = Cli::try_parse_from([
        "shopscope-cli",
        "scrape",
        "https://www.etsy.com/listing/1/mug",
        "--strategy",
        "curl",
    ]);
    assert!(result.is_err());
}

#[test]
fn scrape_requires_url() {
    assert!(Cli::try_parse_from(["shopscope-cli", "scrape"]).is_err());
}

#[test]
fn parses_proxies_command() {
    let cli = Cli::try_parse_from(["shopscope-cli", "proxies", "proxies.txt"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Proxies { ref path } if path == &PathBuf::from("proxies.txt")
    ));
}

#[test]
fn strategy_arg_maps_to_config_kind() {
    assert_eq!(
        FetchStrategyKind::from(StrategyArg::Gateway),
        FetchStrategyKind::Gateway
    );
    assert_eq!(
        FetchStrategyKind::from(StrategyArg::Browser),
        FetchStrategyKind::Browser
    );
}
