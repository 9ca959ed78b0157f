use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// Where `config.toml` and `secrets.toml` live. Nothing is created; both
/// files are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDir(PathBuf);

impl ConfigDir {
    /// `$GEMINI_CHAT_HOME`, else `$XDG_CONFIG_HOME/gemini-chat`, else
    /// `$HOME/.config/gemini-chat`.
    pub fn locate() -> anyhow::Result<Self> {
        Self::locate_with(|name| env::var_os(name))
    }

    fn locate_with(var: impl Fn(&str) -> Option<OsString>) -> anyhow::Result<Self> {
        if let Some(dir) = var("GEMINI_CHAT_HOME") {
            return Ok(Self(PathBuf::from(dir)));
        }
        let base = match var("XDG_CONFIG_HOME") {
            Some(xdg) => PathBuf::from(xdg),
            None => match var("HOME") {
                Some(home) => PathBuf::from(home).join(".config"),
                None => anyhow::bail!("HOME is not set; set GEMINI_CHAT_HOME to pick a config directory"),
            },
        };
        Ok(Self(base.join("gemini-chat")))
    }

    pub fn config_file(&self) -> PathBuf {
        self.0.join("config.toml")
    }

    pub fn secrets_file(&self) -> PathBuf {
        self.0.join("secrets.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn locate(vars: &[(&str, &str)]) -> anyhow::Result<ConfigDir> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        ConfigDir::locate_with(|name| vars.get(name).cloned())
    }

    #[test]
    fn app_home_wins_over_xdg_and_home() {
        let dir = locate(&[
            ("GEMINI_CHAT_HOME", "/srv/chat"),
            ("XDG_CONFIG_HOME", "/xdg"),
            ("HOME", "/home/u"),
        ])
        .unwrap();
        assert_eq!(dir.config_file(), PathBuf::from("/srv/chat/config.toml"));
    }

    #[test]
    fn falls_back_to_xdg_then_home() {
        let dir = locate(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/u")]).unwrap();
        assert_eq!(dir.secrets_file(), PathBuf::from("/xdg/gemini-chat/secrets.toml"));

        let dir = locate(&[("HOME", "/home/u")]).unwrap();
        assert_eq!(
            dir.config_file(),
            PathBuf::from("/home/u/.config/gemini-chat/config.toml")
        );

        assert!(locate(&[]).is_err());
    }
}
