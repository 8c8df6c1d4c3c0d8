use std::io::Write;

use admin_revoker::config::{Config, Transport, DB_URL_ENV};
use admin_revoker::storage::{create_certificate_store, CertificateStore, StoreTransaction};
use admin_revoker::ConfigError;

fn write(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_load_each_format() {
    let json = write(
        ".json",
        r#"{
            "revoker": {
                "db": { "url": "memory:" },
                "transport": "http",
                "ra_service": { "address": "http://127.0.0.1:8001" },
                "sa_service": { "address": "http://127.0.0.1:8002" }
            },
            "logging": { "level": "debug" }
        }"#,
    );
    let yaml = write(
        ".yaml",
        "revoker:\n  db:\n    url: \"memory:\"\n  ra_service:\n    address: http://127.0.0.1:8001\n  sa_service:\n    address: http://127.0.0.1:8002\n",
    );
    let toml = write(
        ".toml",
        "[revoker.db]\nurl = \"memory:\"\n\n[revoker.ra_service]\naddress = \"http://127.0.0.1:8001\"\n\n[revoker.sa_service]\naddress = \"http://127.0.0.1:8002\"\ntimeout_ms = 250\n",
    );

    let from_json = Config::load(json.path()).await.unwrap();
    assert_eq!(from_json.revoker.transport, Transport::Http);
    assert_eq!(from_json.logging.level, "debug");

    let from_yaml = Config::load(yaml.path()).await.unwrap();
    assert_eq!(from_yaml.revoker.transport, Transport::Grpc);

    let from_toml = Config::load(toml.path()).await.unwrap();
    assert_eq!(from_toml.revoker.sa_service.timeout_ms, 250);
}

#[tokio::test]
async fn test_load_rejects_unknown_extension_and_bad_content() {
    let ini = write(".ini", "[revoker]\n");
    assert!(matches!(Config::load(ini.path()).await, Err(ConfigError::ParseError(_))));

    let broken = write(".json", "{ \"revoker\": ");
    assert!(matches!(Config::load(broken.path()).await, Err(ConfigError::ParseError(_))));
}

#[tokio::test]
async fn test_load_rejects_invalid_settings() {
    let zero_pool = write(
        ".json",
        r#"{
            "revoker": {
                "db": { "url": "memory:", "max_connections": 0 },
                "ra_service": { "address": "http://ra" },
                "sa_service": { "address": "http://sa" }
            }
        }"#,
    );
    assert!(matches!(
        Config::load(zero_pool.path()).await,
        Err(ConfigError::ValidationError(_))
    ));

    for db in [
        r#"{ "url": "memory:", "connect_timeout_ms": 0 }"#,
        r#"{ "url": "memory:", "query_timeout_ms": 0 }"#,
    ] {
        let zero_timeout = write(
            ".json",
            &format!(
                r#"{{
                    "revoker": {{
                        "db": {},
                        "ra_service": {{ "address": "http://ra" }},
                        "sa_service": {{ "address": "http://sa" }}
                    }}
                }}"#,
                db
            ),
        );
        assert!(matches!(
            Config::load(zero_timeout.path()).await,
            Err(ConfigError::ValidationError(_))
        ));
    }

    let zero_ra_timeout = write(
        ".json",
        r#"{
            "revoker": {
                "db": { "url": "memory:" },
                "ra_service": { "address": "http://ra", "timeout_ms": 0 },
                "sa_service": { "address": "http://sa" }
            }
        }"#,
    );
    assert!(matches!(
        Config::load(zero_ra_timeout.path()).await,
        Err(ConfigError::ValidationError(_))
    ));

    let half_tls = write(
        ".json",
        r#"{
            "revoker": {
                "db": { "url": "memory:" },
                "tls": { "cert_file": "/etc/revoker/client.pem" },
                "ra_service": { "address": "https://ra" },
                "sa_service": { "address": "https://sa" }
            }
        }"#,
    );
    assert!(matches!(
        Config::load(half_tls.path()).await,
        Err(ConfigError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_memory_url_selects_in_memory_store() {
    if std::env::var(DB_URL_ENV).is_ok() {
        return;
    }
    let file = write(
        ".yml",
        "revoker:\n  db:\n    url: \"memory:\"\n  ra_service:\n    address: http://ra\n  sa_service:\n    address: http://sa\n",
    );
    let config = Config::load(file.path()).await.unwrap();

    let store = create_certificate_store(&config.revoker.db).await.unwrap();
    assert!(store.is_healthy().await);
    let tx = store.begin().await.unwrap();
    tx.rollback().await.unwrap();
}
