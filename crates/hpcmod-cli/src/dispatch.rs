use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;
use hpcmod_core::traits::{
    confirm_or_forced, InstallOptions, ModuleManager, UninstallRequest, ViewManager,
};
use hpcmod_core::{
    lifecycle_error, resolve_settings_path, InstalledIndex, LifecycleError, Settings, SoftwareName,
};
use hpcmod_installer::{CommandPuller, FsModuleManager, FsViewManager, ModuleLayout};
use hpcmod_lifecycle::{
    build_reinstall_report, build_upgrade_report, ensure_batch_succeeded,
    format_reinstall_summary_line, format_upgrade_summary_line, BatchEntry, DryRunReport,
    Lifecycle, LifecycleOptions, ReinstallReport, UpgradeOutcome, ViewsOutcome,
};
use hpcmod_registry::Registries;

use crate::prompt::TerminalConfirm;
use crate::render::{format_batch_output_lines, resolve_batch_progress_mode, TerminalRenderer};
use crate::{Cli, CliContainerTech, CliModuleSystem, Commands, ViewCommands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut stdout = io::stdout();
        clap_complete::generate(Shell::from(shell), &mut Cli::command(), "hpcmod", &mut stdout);
        return Ok(());
    }

    let settings = load_settings(
        cli.settings_file.as_deref(),
        &cli.config_params,
        cli.module_sys,
        cli.container_tech,
    )?;
    let renderer = TerminalRenderer::current();

    if let Commands::Settings = cli.command {
        let rendered = toml::to_string(&settings).context("failed to render settings")?;
        print!("{rendered}");
        return Ok(());
    }

    let session = Session::open(settings)?;
    match cli.command {
        Commands::Install {
            recipe,
            container_image,
            keep_path,
            no_view,
            force,
        } => {
            let name = session.parse_name(&recipe)?;
            let options = InstallOptions {
                container_image,
                keep_path,
                force,
            };
            session.modules.layout().ensure_base_dirs()?;
            let module_dir = session.modules.install(&name, &options)?;
            renderer.print_status(
                "ok",
                &format!("installed {name} to {}", module_dir.display()),
            );
            if !no_view {
                session.add_to_default_view(renderer, &name, &module_dir)?;
            }
        }
        Commands::Uninstall {
            recipe,
            all,
            force,
            keep_container,
        } => {
            let request = UninstallRequest {
                force,
                keep_container,
            };
            match (recipe, all) {
                (Some(_), true) => {
                    return Err(LifecycleError::InvalidArgument(
                        "'hpcmod uninstall --all' does not take a recipe".to_string(),
                    )
                    .into())
                }
                (Some(recipe), false) => {
                    let name = session.parse_name(&recipe)?;
                    session.uninstall_one(renderer, &name, request)?;
                }
                (None, _) => session.uninstall_all(renderer, request)?,
            }
        }
        Commands::Reinstall {
            recipe,
            container_image,
            keep_path,
            all,
            update_containers,
            no_view,
        } => {
            let options = LifecycleOptions {
                default_view: session.settings.default_view.clone(),
                no_view,
                ..LifecycleOptions::default()
            };
            let lifecycle = session.lifecycle(options);
            match (recipe, all) {
                (Some(_), true) => {
                    return Err(LifecycleError::InvalidArgument(
                        "'hpcmod reinstall --all' does not take a recipe".to_string(),
                    )
                    .into())
                }
                (Some(recipe), false) => {
                    let name = session.parse_name(&recipe)?;
                    let install = InstallOptions {
                        container_image,
                        keep_path,
                        force: false,
                    };
                    match lifecycle.reinstall_with(&name, update_containers, &install) {
                        Err(err) if is_not_installed(&err) => print_not_installed(&name),
                        Err(err) => return Err(err),
                        Ok(report) => {
                            for (status, line) in format_reinstall_outcome_lines(&report) {
                                renderer.print_status(status, &line);
                            }
                            report.ensure_succeeded()?;
                        }
                    }
                }
                (None, _) => {
                    let installed = session.modules.list(None)?;
                    if installed.is_empty() {
                        println!("{}", nothing_installed_message("reinstall"));
                        return Ok(());
                    }
                    let mut progress = renderer.start_progress(
                        resolve_batch_progress_mode(renderer.style(), false),
                        "reinstall",
                        installed.len() as u64,
                    );
                    let entries = lifecycle.reinstall_all_with_progress(
                        update_containers,
                        &mut |done, _| progress.set(done as u64),
                    );
                    let entries = match entries {
                        Ok(entries) => {
                            progress.finish_success();
                            entries
                        }
                        Err(err) => {
                            progress.finish_abandon();
                            return Err(err);
                        }
                    };
                    let report = build_reinstall_report(&entries);
                    renderer.print_section("reinstall");
                    renderer.print_lines(&format_batch_output_lines(&report, renderer.style()));
                    println!("{}", format_reinstall_summary_line(&report));
                    ensure_batch_succeeded("reinstall", report.failed)?;
                }
            }
        }
        Commands::Upgrade {
            recipe,
            all,
            dry_run,
            force,
            json,
        } => {
            let options = LifecycleOptions {
                force,
                dry_run,
                ..LifecycleOptions::default()
            };
            let lifecycle = session.lifecycle(options);
            match (recipe, all) {
                (Some(_), true) => {
                    return Err(LifecycleError::InvalidArgument(
                        "'hpcmod upgrade --all' does not take a recipe".to_string(),
                    )
                    .into())
                }
                (Some(recipe), false) => {
                    let name = session.parse_name(&recipe)?;
                    let outcome = match lifecycle.upgrade(&name) {
                        Err(err) if is_not_installed(&err) => {
                            print_not_installed(&name);
                            return Ok(());
                        }
                        other => other?,
                    };
                    if json {
                        let entries = vec![BatchEntry {
                            name,
                            result: Ok(outcome),
                        }];
                        print_dry_run_json(&entries)?;
                        return Ok(());
                    }
                    for (status, line) in format_upgrade_outcome_lines(&name, &outcome) {
                        renderer.print_status(status, &line);
                    }
                }
                (None, _) => {
                    let installed = session.modules.list(None)?;
                    if installed.is_empty() {
                        println!("{}", nothing_installed_message("upgrade"));
                        return Ok(());
                    }
                    let mut progress = renderer.start_progress(
                        resolve_batch_progress_mode(renderer.style(), !(force || dry_run)),
                        "upgrade",
                        installed.len() as u64,
                    );
                    let entries = lifecycle
                        .upgrade_all_with_progress(&mut |done, _| progress.set(done as u64));
                    let entries = match entries {
                        Ok(entries) => {
                            progress.finish_success();
                            entries
                        }
                        Err(err) => {
                            progress.finish_abandon();
                            return Err(err);
                        }
                    };
                    let report = build_upgrade_report(&entries);
                    if json {
                        print_dry_run_json(&entries)?;
                    } else {
                        renderer.print_section("upgrade");
                        renderer
                            .print_lines(&format_batch_output_lines(&report, renderer.style()));
                        println!("{}", format_upgrade_summary_line(&report));
                    }
                    ensure_batch_succeeded("upgrade", report.failed)?;
                }
            }
        }
        Commands::List {
            pattern,
            names_only,
            short,
        } => {
            let index = session.modules.list(pattern.as_deref())?;
            let mode = if names_only {
                ListMode::NamesOnly
            } else if short {
                ListMode::Short
            } else {
                ListMode::Full
            };
            renderer.print_lines(&format_list_lines(&index, mode));
        }
        Commands::Search { query } => {
            let names = session.registries.search_names(&query)?;
            if names.is_empty() {
                println!("No recipes found matching '{query}'");
            }
            renderer.print_lines(&names);
        }
        Commands::View { command } => session.run_view_command(renderer, command)?,
        Commands::Settings | Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Settings file, then `-c key:value` overrides, then the dedicated flags.
pub(crate) fn load_settings(
    settings_file: Option<&Path>,
    config_params: &[String],
    module_sys: Option<CliModuleSystem>,
    container_tech: Option<CliContainerTech>,
) -> Result<Settings> {
    let path = resolve_settings_path(settings_file)?;
    let mut settings = Settings::load(&path)?;
    settings.apply_overrides(config_params)?;
    if let Some(module_sys) = module_sys {
        settings.module_sys = module_sys.into();
    }
    if let Some(container_tech) = container_tech {
        settings.container_tech = container_tech.into();
    }
    tracing::debug!(settings = %path.display(), "loaded settings");
    Ok(settings)
}

struct Session {
    settings: Settings,
    registries: Registries,
    modules: FsModuleManager<Registries>,
    views: FsViewManager,
    confirm: TerminalConfirm,
}

impl Session {
    fn open(settings: Settings) -> Result<Self> {
        let layout = ModuleLayout::from_settings(&settings);
        let registries = Registries::from_locations(&settings.registry)?;
        let modules = FsModuleManager::new(
            layout.clone(),
            registries.clone(),
            Box::new(CommandPuller),
            Box::new(TerminalConfirm),
        )
        .with_wrapper_scripts(settings.wrapper_scripts);
        Ok(Self {
            settings,
            registries,
            modules,
            views: FsViewManager::new(layout),
            confirm: TerminalConfirm,
        })
    }

    fn parse_name(&self, raw: &str) -> Result<SoftwareName> {
        Ok(SoftwareName::parse(raw)?.with_namespace(self.settings.namespace.as_deref()))
    }

    fn lifecycle(&self, options: LifecycleOptions) -> Lifecycle<'_> {
        Lifecycle::new(
            &self.registries,
            &self.modules,
            &self.views,
            &self.confirm,
            options,
        )
    }

    fn add_to_default_view(
        &self,
        renderer: TerminalRenderer,
        name: &SoftwareName,
        module_dir: &Path,
    ) -> Result<()> {
        let Some(view) = self.settings.default_view.as_deref() else {
            return Ok(());
        };
        if !self.views.exists(view) {
            renderer.print_status(
                "warn",
                &format!("default view '{view}' does not exist; create it with: hpcmod view create {view}"),
            );
            return Ok(());
        }
        self.views.install_module(view, name, module_dir)?;
        renderer.print_status("ok", &format!("added {name} to view {view}"));
        Ok(())
    }

    fn uninstall_one(
        &self,
        renderer: TerminalRenderer,
        name: &SoftwareName,
        request: UninstallRequest,
    ) -> Result<()> {
        let installed = self.modules.list(Some(name.name()))?;
        let present = match name.tag() {
            Some(tag) => installed.contains_tag(name.name(), tag),
            None => installed.contains(name.name()),
        };
        if !present {
            print_not_installed(name);
            return Ok(());
        }

        if self.modules.uninstall(name, request)? {
            renderer.print_status("ok", &format!("uninstalled {name}"));
        } else {
            renderer.print_status("warn", &format!("kept {name}"));
        }
        Ok(())
    }

    fn uninstall_all(&self, renderer: TerminalRenderer, request: UninstallRequest) -> Result<()> {
        let installed = self.modules.list(None)?;
        if installed.is_empty() {
            println!("{}", nothing_installed_message("uninstall"));
            return Ok(());
        }
        let message = format!(
            "Are you sure you want to uninstall all {} installed software?",
            installed.len()
        );
        if !confirm_or_forced(&self.confirm, &message, request.force)? {
            renderer.print_status("warn", "uninstall cancelled");
            return Ok(());
        }

        let request = UninstallRequest {
            force: true,
            ..request
        };
        for name in installed.names() {
            let name = SoftwareName::bare(name);
            self.modules.uninstall(&name, request)?;
            renderer.print_status("ok", &format!("uninstalled {name}"));
        }
        Ok(())
    }

    fn run_view_command(&self, renderer: TerminalRenderer, command: ViewCommands) -> Result<()> {
        match command {
            ViewCommands::Create { view } => {
                let dir = self.views.create(&view)?;
                renderer.print_status(
                    "ok",
                    &format!("created view {view} at {}", dir.display()),
                );
            }
            ViewCommands::Delete { view, force } => {
                if !self.views.exists(&view) {
                    return Err(LifecycleError::InvalidArgument(format!(
                        "view '{view}' does not exist"
                    ))
                    .into());
                }
                let message = format!("Are you sure you want to delete view {view}?");
                if !confirm_or_forced(&self.confirm, &message, force)? {
                    renderer.print_status("warn", &format!("kept view {view}"));
                    return Ok(());
                }
                self.views.delete(&view)?;
                renderer.print_status("ok", &format!("deleted view {view}"));
            }
            ViewCommands::List { view: None } => renderer.print_lines(&self.views.list()?),
            ViewCommands::List { view: Some(view) } => {
                renderer.print_lines(&self.views.members(&view)?)
            }
            ViewCommands::Install { view, recipe } => {
                let name = self.parse_name(&recipe)?;
                let installed = self.modules.list(Some(name.name()))?;
                let Some(tag) = view_install_tag(&installed, &name) else {
                    return Err(LifecycleError::not_installed(name.to_string()).into());
                };
                let qualified = name.with_tag(&tag);
                let module_dir = self.modules.module_dir(name.name(), &tag);
                self.views.install_module(&view, &qualified, &module_dir)?;
                renderer.print_status("ok", &format!("added {qualified} to view {view}"));
            }
            ViewCommands::Uninstall { view, recipe } => {
                let name = self.parse_name(&recipe)?;
                let installed = self.modules.list(Some(name.name()))?;
                let tags = match name.tag() {
                    Some(tag) => vec![tag.to_string()],
                    None => installed.tags(name.name()).to_vec(),
                };
                let mut removed = 0_usize;
                for tag in &tags {
                    if self.views.uninstall_module(&view, name.name(), tag)? {
                        removed += 1;
                    }
                }
                if removed == 0 {
                    renderer.print_status("warn", &format!("{name} is not in view {view}"));
                } else {
                    renderer.print_status("ok", &format!("removed {name} from view {view}"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ListMode {
    Full,
    Short,
    NamesOnly,
}

pub(crate) fn format_list_lines(index: &InstalledIndex, mode: ListMode) -> Vec<String> {
    match mode {
        ListMode::NamesOnly => index.names().map(str::to_string).collect(),
        ListMode::Short => index
            .iter()
            .map(|(name, tags)| format!("{name}: {}", tags.join(", ")))
            .collect(),
        ListMode::Full => index
            .iter()
            .flat_map(|(name, tags)| tags.iter().map(move |tag| format!("{name}:{tag}")))
            .collect(),
    }
}

/// Requested tag when installed, otherwise the most recently installed one.
pub(crate) fn view_install_tag(installed: &InstalledIndex, name: &SoftwareName) -> Option<String> {
    match name.tag() {
        Some(tag) => installed
            .contains_tag(name.name(), tag)
            .then(|| tag.to_string()),
        None => installed.tags(name.name()).last().cloned(),
    }
}

pub(crate) fn format_upgrade_outcome_lines(
    name: &SoftwareName,
    outcome: &UpgradeOutcome,
) -> Vec<(&'static str, String)> {
    match outcome {
        UpgradeOutcome::UpToDate { latest } => vec![(
            "step",
            format!("You have the latest version of {name} ({latest}) installed already"),
        )],
        UpgradeOutcome::Available { installed, latest } => vec![(
            "step",
            format!(
                "{name}: {latest} available (installed: {})",
                installed.join(", ")
            ),
        )],
        UpgradeOutcome::Upgraded(summary) => {
            let mut lines = vec![(
                "ok",
                format!("upgraded {name} to {}", summary.latest),
            )];
            if !summary.old_removed {
                lines.push((
                    "warn",
                    format!(
                        "old versions of {name} were preserved: {}",
                        summary.previous.join(", ")
                    ),
                ));
            }
            match &summary.views {
                ViewsOutcome::NoViews => {}
                ViewsOutcome::Installed(views) => {
                    for view in views {
                        lines.push((
                            "ok",
                            format!("installed the latest version of {name} to view: {view}"),
                        ));
                    }
                }
                ViewsOutcome::Declined(views) => lines.push((
                    "warn",
                    format!(
                        "view(s) {} still hold the previous version of {name}",
                        views.join(", ")
                    ),
                )),
            }
            lines
        }
    }
}

pub(crate) fn format_reinstall_outcome_lines(
    report: &ReinstallReport,
) -> Vec<(&'static str, String)> {
    let mut lines = Vec::new();
    for outcome in &report.tags {
        let qualified = report.name.with_tag(&outcome.tag);
        match &outcome.result {
            Ok(reinstalled) if reinstalled.views.is_empty() => {
                lines.push(("ok", format!("reinstalled {qualified}")));
            }
            Ok(reinstalled) => lines.push((
                "ok",
                format!(
                    "reinstalled {qualified} (views: {})",
                    reinstalled.views.join(", ")
                ),
            )),
            Err(err) => lines.push(("err", format!("failed to reinstall {qualified}: {err:#}"))),
        }
    }
    lines
}

pub(crate) fn nothing_installed_message(operation: &str) -> String {
    format!(
        "Cannot perform hpcmod {operation} because you currently do not have any software installed."
    )
}

fn print_dry_run_json(entries: &[BatchEntry<UpgradeOutcome>]) -> Result<()> {
    let report = DryRunReport::from_entries(entries);
    let rendered =
        serde_json::to_string_pretty(&report).context("failed to render dry-run report")?;
    println!("{rendered}");
    Ok(())
}

fn is_not_installed(err: &anyhow::Error) -> bool {
    matches!(
        lifecycle_error(err),
        Some(LifecycleError::NotInstalled { .. })
    )
}

/// Not having the software installed is reported, not treated as a failure.
fn print_not_installed(name: &SoftwareName) {
    println!("You currently do not have {name} installed.");
    println!("You can install it with this command: hpcmod install {name}");
}
