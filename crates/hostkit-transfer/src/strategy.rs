//! Command construction for each copy strategy

use std::path::Path;

use hostkit_exec::{Command, Controls, OptionValue, Options, OptionsPlacement};

use crate::endpoint::Location;
use crate::error::TransferError;

/// scp switches that cannot be spelled as option names
pub const SCP_SHORTCUTS: [(&str, &str); 5] = [
    ("force_protocol1", "1"),
    ("force_protocol2", "2"),
    ("force_localhost", "3"),
    ("force_ipv4", "4"),
    ("force_ipv6", "6"),
];

/// SSH options passed to scp unless the caller names them
pub const SCP_DEFAULT_SSH_OPTIONS: [(&str, &str); 2] =
    [("StrictHostKeyChecking", "no"), ("ConnectTimeout", "2")];

fn enabled(value: &OptionValue) -> bool {
    match value {
        OptionValue::Flag(flag) => *flag,
        OptionValue::Value(text) => !text.is_empty(),
        OptionValue::List(items) => !items.is_empty(),
    }
}

/// Build an `scp` command
///
/// # Errors
/// `InvalidOption` when `o` is not a list: ssh options may repeat.
pub fn scp(
    src: &Location,
    src_path: &str,
    dst: &Location,
    dst_path: &str,
    mut options: Options,
) -> Result<Command, TransferError> {
    let mut ssh_options = match options.get("o") {
        None => Vec::new(),
        Some(OptionValue::List(values)) => values.clone(),
        Some(other) => {
            return Err(TransferError::InvalidOption(format!(
                "'o' must be a list of ssh options, got {other:?}"
            )));
        }
    };
    let named: Vec<String> = ssh_options
        .iter()
        .map(|opt| opt.split('=').next().unwrap_or_default().to_string())
        .collect();
    for (name, default) in SCP_DEFAULT_SSH_OPTIONS {
        if !named.iter().any(|n| n == name) {
            ssh_options.push(format!("{name}={default}"));
        }
    }
    options.set("o", ssh_options);

    for (shortcut, flag) in SCP_SHORTCUTS {
        if options.remove(shortcut).is_some_and(|value| enabled(&value)) {
            options.set_default(flag, true);
        }
    }

    Ok(Command::new("scp")
        .opts(options)
        .arg(src.format(src_path))
        .arg(dst.format(dst_path)))
}

/// Build an `rsync` command
#[must_use]
pub fn rsync(
    src: &Location,
    src_path: &str,
    dst: &Location,
    dst_path: &str,
    options: Options,
) -> Command {
    Command::new("rsync")
        .opts(options)
        .arg(src.format(src_path))
        .arg(dst.format(dst_path))
}

/// Tar options for one side of the pipe
pub struct TarSides {
    /// Applied to both sides
    pub common: Options,
    pub src: Options,
    pub dst: Options,
}

/// Build `[ssh src] tar cf - -C <dir> <name> | [ssh dst] tar xf - -C <dst>`
///
/// Common options override per-side ones; `C` is only defaulted.
#[must_use]
pub fn tar(
    src: &Location,
    src_path: &str,
    dst: &Location,
    dst_path: &str,
    sides: TarSides,
    placement: OptionsPlacement,
) -> Command {
    let (dir, name) = split_path(src_path);

    let mut src_opts = sides.src;
    let mut dst_opts = sides.dst;
    for (option, value) in sides.common.iter() {
        src_opts.set(option, value.clone());
        dst_opts.set(option, value.clone());
    }
    src_opts.set_default("C", dir);
    dst_opts.set_default("C", dst_path);

    // the sides run inside the pipeline, so only the outer command gets the
    // locale and environment prefix
    let bare = Controls {
        locale: String::new(),
        options_placement: placement,
        ..Controls::default()
    };
    let create = Command::new("tar cf -")
        .opts(src_opts)
        .arg(name)
        .format(&bare)
        .render();
    let extract = Command::new("tar xf -").opts(dst_opts).format(&bare).render();

    // a remote side is re-parsed by the far shell, so it travels as one
    // quoted word
    let command = if src.is_remote() {
        Command::new("ssh").arg(src.ssh_target()).arg(create)
    } else {
        Command::new(create)
    };
    let command = command.raw_arg("|");
    if dst.is_remote() {
        command
            .raw_arg("ssh")
            .arg(dst.ssh_target())
            .arg(extract)
    } else {
        command.raw_arg(extract)
    }
}

fn split_path(path: &str) -> (String, String) {
    let path = Path::new(path);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    };
    (dir, name)
}
