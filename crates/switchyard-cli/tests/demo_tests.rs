//! End-to-end run of the scripted demo

use switchyard_cli::{commands::run_demo, AppConfig};

fn seeded_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.router.discriminator_seed = Some(42);
    config
}

#[tokio::test]
async fn test_demo_reports_final_state() {
    let report = run_demo(seeded_config()).await.expect("demo should run");

    let stats = &report["stats"];
    assert_eq!(stats["connections_opened"], 4);
    assert_eq!(stats["connections_closed"], 2);
    assert_eq!(stats["links_forwarded"], 1);

    let snapshot = &report["snapshot"];
    assert_eq!(snapshot["connections"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["links"].as_array().unwrap().len(), 3);
    assert_eq!(snapshot["free_mask_bits"], 64);

    let keys: Vec<&str> = snapshot["addresses"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["key"].as_str())
        .collect();
    assert_eq!(keys.len(), 4);
    assert_eq!(&keys[..3], ["Lqdhello", "Dbroker", "Mservice.orders"]);
    assert!(keys[3].starts_with("Ltemp."));

    // Mobile added and removed, one forwarded attach, one lost control link
    assert_eq!(report["routing_events"], 4);
    assert_eq!(report["transport"]["pushes"], 1);
    assert_eq!(report["transport"]["first_attaches"], 4);
}

#[tokio::test]
async fn test_demo_is_deterministic_with_seed() {
    let first = run_demo(seeded_config()).await.unwrap();
    let second = run_demo(seeded_config()).await.unwrap();
    assert_eq!(first["snapshot"]["addresses"], second["snapshot"]["addresses"]);
}
