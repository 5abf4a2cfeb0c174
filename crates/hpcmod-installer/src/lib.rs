mod container;
mod fs_utils;
mod layout;
mod manager;
mod modulefile;
mod receipts;
mod views;

pub use container::{sha256_file, strip_scheme, CommandPuller, ContainerPuller};
pub use layout::{ModuleLayout, RECEIPT_FILE_NAME, VIEW_CONFIG_FILE_NAME};
pub use manager::FsModuleManager;
pub use modulefile::{
    container_env_var, exec_invocation, render_module_file, render_wrapper_script,
    ModuleFileContext,
};
pub use receipts::{
    read_installed_index, read_module_receipt, read_module_receipts, write_module_receipt,
    ModuleReceipt,
};
pub use views::{FsViewManager, ViewConfig};

#[cfg(test)]
mod tests;
