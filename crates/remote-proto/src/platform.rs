use std::path::PathBuf;

const APP_DIR: &str = "remote-panel";

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/remote-panel/ (XDG standard)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

/// Directory for state that lives as long as the user's login session.
/// `None` when the platform has no such directory.
pub fn session_dir() -> Option<PathBuf> {
    dirs::runtime_dir().map(|dir| dir.join(APP_DIR))
}
