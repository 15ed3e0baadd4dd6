//! Command sequence building for the flashing backend
//!
//! Every operation is a short, ordered list of external commands. Builders here
//! are pure; [`crate::executor`] runs the result.

use std::path::Path;

use geekflash_core::AvbParams;

/// A single external command in a sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Prefix the invocation with `sudo`
    pub sudo: bool,
    /// Pause before launching this command
    pub delay_before_ms: u64,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            sudo: false,
            delay_before_ms: 0,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    pub fn delay_before_ms(mut self, ms: u64) -> Self {
        self.delay_before_ms = ms;
        self
    }

    /// Shell-like rendering used in the `Running:` log line
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 2);
        if self.sudo {
            parts.push("sudo".to_string());
        }
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Tool names and device constants the builders substitute in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOptions {
    pub edl_program: String,
    pub fastboot_program: String,
    pub python_program: String,
    /// Run `edl` writes through sudo (raw USB access)
    pub use_sudo: bool,
    /// Wait after `fastboot oem edl` for the device to re-enumerate
    pub edl_switch_delay_ms: u64,
    pub boot_partition: String,
    pub gpt_lun: u32,
    /// Sector of the backup GPT on the target LUN
    pub gpt_backup_sector: u64,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            edl_program: "edl".to_string(),
            fastboot_program: "fastboot".to_string(),
            python_program: "python3".to_string(),
            use_sudo: true,
            edl_switch_delay_ms: 2000,
            boot_partition: "boot_a".to_string(),
            gpt_lun: 4,
            gpt_backup_sector: 1_048_543,
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn loader_arg(loader: &Path) -> String {
    format!("--loader={}", loader.display())
}

/// Flash (or restore) the boot partition over EDL.
///
/// 1. `fastboot oem edl` - switch the device into EDL mode
/// 2. (delay) `sudo edl w boot_a <boot_img> --loader=<loader>`
pub fn build_flash_boot_commands(
    opts: &CommandOptions,
    boot_img: &Path,
    loader: &Path,
) -> Vec<CommandSpec> {
    vec![
        CommandSpec::new(&opts.fastboot_program).arg("oem").arg("edl"),
        CommandSpec::new(&opts.edl_program)
            .arg("w")
            .arg(&opts.boot_partition)
            .arg(path_arg(boot_img))
            .arg(loader_arg(loader))
            .sudo(opts.use_sudo)
            .delay_before_ms(opts.edl_switch_delay_ms),
    ]
}

/// Rewrite the primary and backup GPT on the boot LUN.
///
/// 1. `sudo edl ws 0 <gpt_main> --lun=4 --loader=<loader>`
/// 2. `sudo edl ws 1048543 <gpt_backup> --lun=4 --loader=<loader>`
pub fn build_fix_gpt_commands(
    opts: &CommandOptions,
    gpt_main: &Path,
    gpt_backup: &Path,
    loader: &Path,
) -> Vec<CommandSpec> {
    let lun = format!("--lun={}", opts.gpt_lun);
    vec![
        CommandSpec::new(&opts.edl_program)
            .arg("ws")
            .arg("0")
            .arg(path_arg(gpt_main))
            .arg(&lun)
            .arg(loader_arg(loader))
            .sudo(opts.use_sudo),
        CommandSpec::new(&opts.edl_program)
            .arg("ws")
            .arg(opts.gpt_backup_sector.to_string())
            .arg(path_arg(gpt_backup))
            .arg(&lun)
            .arg(loader_arg(loader))
            .sudo(opts.use_sudo),
    ]
}

/// Re-sign a boot image with avbtool.
///
/// 1. `python3 <avbtool> erase_footer --image <boot_img>`
/// 2. `python3 <avbtool> add_hash_footer --image <boot_img> --partition_name ...
///    --partition_size ... --algorithm ... --key ... --rollback_index ... --salt ...
///    [--prop key:value]...`
pub fn build_sign_avb_commands(
    opts: &CommandOptions,
    boot_img: &Path,
    avbtool_path: &Path,
    key_path: &Path,
    params: &AvbParams,
) -> Vec<CommandSpec> {
    let erase = CommandSpec::new(&opts.python_program)
        .arg(path_arg(avbtool_path))
        .arg("erase_footer")
        .arg("--image")
        .arg(path_arg(boot_img));

    let mut add = CommandSpec::new(&opts.python_program)
        .arg(path_arg(avbtool_path))
        .arg("add_hash_footer")
        .arg("--image")
        .arg(path_arg(boot_img))
        .arg("--partition_name")
        .arg(&params.partition_name)
        .arg("--partition_size")
        .arg(params.partition_size.to_string())
        .arg("--algorithm")
        .arg(&params.algorithm)
        .arg("--key")
        .arg(path_arg(key_path))
        .arg("--rollback_index")
        .arg(params.rollback_index.to_string())
        .arg("--salt")
        .arg(&params.salt);

    for prop in &params.props {
        add = add
            .arg("--prop")
            .arg(format!("{}:{}", prop.key, prop.value));
    }

    vec![erase, add]
}
