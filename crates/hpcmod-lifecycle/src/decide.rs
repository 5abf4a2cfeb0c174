/// What an upgrade of one software should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeAction {
    NoActionLatestInstalled,
    UpgradeAvailable,
}

/// Tags are opaque: the latest tag is either installed verbatim or it is not.
pub fn decide<S: AsRef<str>>(installed: &[S], latest: &str) -> UpgradeAction {
    if installed.iter().any(|tag| tag.as_ref() == latest) {
        UpgradeAction::NoActionLatestInstalled
    } else {
        UpgradeAction::UpgradeAvailable
    }
}
