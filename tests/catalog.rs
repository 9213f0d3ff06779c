use rstest::rstest;

use cheapcart::catalog::{Condition, ItemKey, PrepareConfig, parse_catalog, prepare};
use cheapcart::error::CatalogError;

const WANTED: &str = r#"{
    "stores": [
        {"name": "Brick Barn", "login": "brickbarn"},
        {"name": "Plate Palace", "login": "platepalace"},
        {"name": "Used Only", "login": "usedonly"}
    ],
    "items": [
        {
            "part": "3001", "color": "5", "name": "Brick 2 x 4", "color_name": "Red",
            "quantity": 4, "max_price": 0.30, "condition": "N",
            "offers": [
                {"store": "Brick Barn", "quantity": 3, "price": 0.20, "condition": "N"},
                {"store": "Plate Palace", "quantity": 10, "price": 0.25, "condition": "N"},
                {"store": "Used Only", "quantity": 50, "price": 0.05, "condition": "U"},
                {"store": "Plate Palace", "quantity": 9, "price": 0.45, "condition": "N"},
                {"store": "Unlisted", "quantity": 9, "price": 0.01, "condition": "N"}
            ]
        },
        {
            "part": "3020", "color": "1", "quantity": 2,
            "offers": [
                {"store": "Plate Palace", "quantity": 2, "price": 0.10, "condition": "N"},
                {"store": "Used Only", "quantity": 0, "price": 0.02, "condition": "U"},
                {"store": "Used Only", "quantity": 5, "price": 0.03, "condition": "U"}
            ]
        }
    ]
}"#;

#[test]
fn default_rules_filter_condition_price_and_directory() {
    let cat = prepare(parse_catalog(WANTED).unwrap(), &PrepareConfig::default()).unwrap();

    let brick = cat.item_index(&ItemKey::new("3001", "5")).unwrap();
    let item = &cat.items()[brick];
    assert_eq!(item.name, "Brick 2 x 4");
    assert_eq!(item.color_name, "Red");
    assert_eq!(item.offered, 5);
    // used, over max price, and unlisted store are all dropped
    assert_eq!(item.lots.len(), 2);
    let avg = item.average_price.unwrap();
    assert!((avg - 0.225).abs() < 1e-12);

    let plate = cat.item_index(&ItemKey::new("3020", "1")).unwrap();
    assert_eq!(cat.items()[plate].name, "3020");
    assert_eq!(cat.items()[plate].lots.len(), 2);

    assert_eq!(cat.n_sellers(), 3);
    let used = cat.seller_index("Used Only").unwrap();
    assert_eq!(cat.sellers()[used].login, "usedonly");
    assert_eq!(cat.sellers()[used].lots.len(), 1);
    assert!(cat.sellers()[used].coverage.contains(plate));
    assert!(!cat.sellers()[used].coverage.contains(brick));
}

#[test]
fn relaxed_rules_keep_everything_listed() {
    let cfg = PrepareConfig {
        match_condition: false,
        enforce_max_price: false,
        ..PrepareConfig::default()
    };
    let cat = prepare(parse_catalog(WANTED).unwrap(), &cfg).unwrap();
    let brick = cat.item_index(&ItemKey::new("3001", "5")).unwrap();
    assert_eq!(cat.items()[brick].lots.len(), 4);
    let conds: Vec<Condition> = cat.items()[brick]
        .lots
        .iter()
        .map(|&l| cat.lots()[l].condition)
        .collect();
    assert!(conds.contains(&Condition::Used));
}

#[rstest]
#[case::deny(PrepareConfig { deny: vec!["Plate Palace".into()], ..PrepareConfig::default() }, &["Brick Barn", "Used Only"])]
#[case::allow(PrepareConfig { allow: Some(vec!["Plate Palace".into()]), ..PrepareConfig::default() }, &["Plate Palace"])]
#[case::min_lots(PrepareConfig { seller_min_lots: 2, ..PrepareConfig::default() }, &["Plate Palace"])]
fn store_rules(#[case] cfg: PrepareConfig, #[case] expected: &[&str]) {
    let cat = prepare(parse_catalog(WANTED).unwrap(), &cfg).unwrap();
    let mut stores: Vec<&str> = cat.sellers().iter().map(|s| s.store.as_str()).collect();
    stores.sort_unstable();
    assert_eq!(stores, expected);
    for (s, seller) in cat.sellers().iter().enumerate() {
        assert!(seller.lots.iter().all(|&l| cat.lots()[l].seller == s));
    }
}

#[test]
fn without_directory_every_store_is_eligible() {
    let raw = parse_catalog(
        r#"{"items": [{"part": "1", "color": "0", "quantity": 1,
            "offers": [{"store": "Anyone", "quantity": 1, "price": 1.0, "condition": "new"}]}]}"#,
    )
    .unwrap();
    let cat = prepare(raw, &PrepareConfig::default()).unwrap();
    assert_eq!(cat.sellers()[0].login, "Anyone");
}

#[test]
fn unsatisfiable_item_is_reported_not_fatal() {
    let raw = parse_catalog(
        r#"{"items": [
            {"part": "1", "color": "0", "quantity": 1,
             "offers": [{"store": "A", "quantity": 1, "price": 1.0, "condition": "new"}]},
            {"part": "2", "color": "0", "quantity": 1, "offers": []}
        ]}"#,
    )
    .unwrap();
    let cat = prepare(raw, &PrepareConfig::default()).unwrap();
    let missing: Vec<String> = cat.unsatisfiable_items().map(|i| i.key.to_string()).collect();
    assert_eq!(missing, vec!["2-0".to_string()]);
}

#[test]
fn duplicate_item_aborts_preparation() {
    let raw = parse_catalog(
        r#"{"items": [
            {"part": "1", "color": "0", "quantity": 1},
            {"part": "1", "color": "0", "quantity": 2}
        ]}"#,
    )
    .unwrap();
    assert!(matches!(
        prepare(raw, &PrepareConfig::default()),
        Err(CatalogError::DuplicateItem(k)) if k == "1-0"
    ));
}

#[test]
fn negative_price_aborts_preparation() {
    let raw = parse_catalog(
        r#"{"items": [{"part": "1", "color": "0", "quantity": 1,
            "offers": [{"store": "A", "quantity": 1, "price": -2.0, "condition": "new"}]}]}"#,
    )
    .unwrap();
    assert!(matches!(
        prepare(raw, &PrepareConfig::default()),
        Err(CatalogError::InvalidPrice { .. })
    ));
}
