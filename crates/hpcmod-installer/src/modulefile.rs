use std::path::Path;

use hpcmod_core::{ContainerTech, ModuleSystem, RecipeConfig};

pub struct ModuleFileContext<'a> {
    pub name: &'a str,
    pub tag: &'a str,
    pub recipe: &'a RecipeConfig,
    pub container_tech: ContainerTech,
    pub container: &'a str,
    /// Directory holding wrapper scripts; `None` renders aliases as shell functions.
    pub wrapper_bin: Option<&'a Path>,
}

pub fn render_module_file(module_sys: ModuleSystem, ctx: &ModuleFileContext<'_>) -> String {
    match module_sys {
        ModuleSystem::Lmod => render_lmod(ctx),
        ModuleSystem::Tcl => render_tcl(ctx),
    }
}

fn render_lmod(ctx: &ModuleFileContext<'_>) -> String {
    let description = ctx.recipe.description.as_deref().unwrap_or("");
    let mut out = String::new();
    out.push_str(&format!(
        "-- generated by hpcmod for {}:{}\n",
        ctx.name, ctx.tag
    ));
    out.push_str(&format!(
        "help([[\nThis module provides the container {}:{}.\n{}\n]])\n\n",
        ctx.name,
        ctx.tag,
        lua_long_string_safe(description)
    ));
    out.push_str(&format!("whatis(\"Name: {}\")\n", lua_escape(ctx.name)));
    out.push_str(&format!("whatis(\"Version: {}\")\n", lua_escape(ctx.tag)));
    if !description.is_empty() {
        out.push_str(&format!(
            "whatis(\"Description: {}\")\n",
            lua_escape(description)
        ));
    }
    if let Some(url) = &ctx.recipe.url {
        out.push_str(&format!("whatis(\"URL: {}\")\n", lua_escape(url)));
    }
    out.push('\n');
    out.push_str(&format!(
        "setenv(\"{}\", \"{}\")\n",
        container_env_var(ctx.name),
        lua_escape(ctx.container)
    ));

    match ctx.wrapper_bin {
        Some(bin) => {
            out.push_str(&format!(
                "prepend_path(\"PATH\", \"{}\")\n",
                lua_escape(&bin.display().to_string())
            ));
        }
        None => {
            for (alias, command) in &ctx.recipe.aliases {
                let invocation = exec_invocation(ctx.container_tech, ctx.container, command);
                out.push_str(&format!(
                    "set_shell_function(\"{}\", \"{} \\\"$@\\\"\", \"{}\")\n",
                    lua_escape(alias),
                    lua_escape(&invocation),
                    lua_escape(&invocation)
                ));
            }
        }
    }
    out
}

fn render_tcl(ctx: &ModuleFileContext<'_>) -> String {
    let description = ctx.recipe.description.as_deref().unwrap_or("");
    let mut out = String::new();
    out.push_str("#%Module\n");
    out.push_str(&format!(
        "## generated by hpcmod for {}:{}\n\n",
        ctx.name, ctx.tag
    ));
    out.push_str("proc ModulesHelp { } {\n");
    out.push_str(&format!(
        "    puts stderr \"This module provides the container {}:{}.\"\n",
        tcl_escape(ctx.name),
        tcl_escape(ctx.tag)
    ));
    out.push_str("}\n\n");
    out.push_str(&format!(
        "module-whatis \"Name: {}\"\n",
        tcl_escape(ctx.name)
    ));
    out.push_str(&format!(
        "module-whatis \"Version: {}\"\n",
        tcl_escape(ctx.tag)
    ));
    if !description.is_empty() {
        out.push_str(&format!(
            "module-whatis \"Description: {}\"\n",
            tcl_escape(description)
        ));
    }
    out.push('\n');
    out.push_str(&format!(
        "setenv {} \"{}\"\n",
        container_env_var(ctx.name),
        tcl_escape(ctx.container)
    ));

    match ctx.wrapper_bin {
        Some(bin) => {
            out.push_str(&format!(
                "prepend-path PATH \"{}\"\n",
                tcl_escape(&bin.display().to_string())
            ));
        }
        None => {
            for (alias, command) in &ctx.recipe.aliases {
                let invocation = exec_invocation(ctx.container_tech, ctx.container, command);
                out.push_str(&format!(
                    "set-alias {} \"{} \\$*\"\n",
                    alias,
                    tcl_escape(&invocation)
                ));
            }
        }
    }
    out
}

pub fn render_wrapper_script(tech: ContainerTech, container: &str, command: &str) -> String {
    format!(
        "#!/bin/bash\n\n{} \"$@\"\n",
        exec_invocation(tech, container, command)
    )
}

/// Shell invocation running `command` inside `container`, without trailing arguments.
pub fn exec_invocation(tech: ContainerTech, container: &str, command: &str) -> String {
    match tech {
        ContainerTech::Singularity => format!(
            "singularity exec ${{SINGULARITY_OPTS}} ${{SINGULARITY_COMMAND_OPTS}} {} {}",
            shell_quote(container),
            shell_quote(command)
        ),
        ContainerTech::Podman | ContainerTech::Docker => {
            let binary = tech.as_str();
            let opts = format!("${{{}_OPTS}}", binary.to_ascii_uppercase());
            format!(
                "{binary} run -i --rm {opts} -v \"$PWD\":\"$PWD\" -w \"$PWD\" --entrypoint {} {}",
                shell_quote(command),
                shell_quote(container)
            )
        }
    }
}

/// `quay.io/biocontainers/samtools` becomes `SAMTOOLS_CONTAINER`.
pub fn container_env_var(name: &str) -> String {
    let short = name.rsplit('/').next().unwrap_or(name);
    let mut var = short
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect::<String>();
    if var.starts_with(|ch: char| ch.is_ascii_digit()) {
        var.insert(0, '_');
    }
    var.push_str("_CONTAINER");
    var
}

fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "/._-:@+=".contains(ch))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn lua_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn lua_long_string_safe(value: &str) -> String {
    value.replace("]]", "] ]")
}

fn tcl_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('[', "\\[")
}
