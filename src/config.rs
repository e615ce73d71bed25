use std::{env, net::SocketAddr, path::PathBuf};

use crate::error::{AppErr, AppResult};

const DEFAULT_PORT: u16 = 8081;

/// Process-wide settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub music_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let port = match get("PORT").filter(|p| !p.is_empty()) {
            Some(raw) => raw
                .parse()
                .map_err(|_| AppErr::Config(format!("invalid PORT: {raw}")))?,
            None => DEFAULT_PORT,
        };
        let dir = |key: &str, default: &str| {
            get(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        };
        Ok(Self {
            port,
            music_dir: dir("MUSIC_DIR", "./music"),
            static_dir: dir("STATIC_DIR", "./web/static"),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.music_dir, PathBuf::from("./music"));
        assert_eq!(cfg.static_dir, PathBuf::from("./web/static"));
        assert_eq!(cfg.addr().port(), 8081);
    }

    #[test]
    fn overrides_from_env() {
        let cfg = Config::from_lookup(lookup(&[("PORT", "9000"), ("MUSIC_DIR", "/srv/tunes")])).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.music_dir, PathBuf::from("/srv/tunes"));
    }

    #[test]
    fn bad_port_is_config_error() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, AppErr::Config(_)));
    }
}
