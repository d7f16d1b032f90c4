//! `ocrgate status`: print a running gateway's health report.

use anyhow::Result;
use ocrgate_config::Settings;

/// Health URL for the configured bind address; wildcard binds are queried on loopback.
fn health_url(settings: &Settings) -> String {
    let host = match settings.bind.as_str() {
        "0.0.0.0" | "" => "127.0.0.1",
        "::" => "[::1]",
        other if other.contains(':') => return format!("http://[{other}]:{}/api/health", settings.port),
        other => other,
    };
    format!("http://{host}:{}/api/health", settings.port)
}

pub async fn run(settings: &Settings) -> Result<()> {
    let url = health_url(settings);
    match reqwest::Client::new().get(&url).send().await {
        Ok(resp) => {
            let body: serde_json::Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Err(_) => {
            println!("ocrgate is not running at {url}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(bind: &str, port: u16) -> Settings {
        Settings {
            bind: bind.into(),
            port,
            ..Settings::default()
        }
    }

    #[test]
    fn wildcard_bind_uses_loopback() {
        assert_eq!(health_url(&settings("0.0.0.0", 8080)), "http://127.0.0.1:8080/api/health");
        assert_eq!(health_url(&settings("::", 9000)), "http://[::1]:9000/api/health");
    }

    #[test]
    fn explicit_bind_is_kept() {
        assert_eq!(health_url(&settings("10.0.0.5", 81)), "http://10.0.0.5:81/api/health");
        assert_eq!(health_url(&settings("fe80::1", 81)), "http://[fe80::1]:81/api/health");
    }
}
