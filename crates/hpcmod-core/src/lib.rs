mod error;
mod installed;
mod name;
mod recipe;
mod settings;
mod system;
pub mod traits;

pub use error::{lifecycle_error, LifecycleError};
pub use installed::InstalledIndex;
pub use name::SoftwareName;
pub use recipe::RecipeConfig;
pub use settings::{default_root, resolve_settings_path, Settings, ROOT_ENV, SETTINGS_ENV};
pub use system::{ContainerTech, ModuleSystem};
