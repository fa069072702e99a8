// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use instancetype::annotations::{stamp_instancetype, stamp_preference};
use instancetype::{requirements, FieldPath, SpecApplier};
use instancetype_api_types::{InstancetypeSpec, PreferenceSpec, VirtualMachine};
use schemars::schema::RootSchema;
use slog::{info, o, warn, Drain, Level, Logger};

#[derive(Debug, Parser)]
#[clap(about, version)]
/// Expand a virtual machine's instance type and preference into its spec
struct Opt {
    /// Enable debugging
    #[clap(short, long, action)]
    debug: bool,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply the referenced profiles and print the resulting VM
    Apply {
        /// TOML catalogue of instance types and preferences
        #[clap(short, long, action)]
        config: PathBuf,

        /// Virtual machine to expand, as JSON
        #[clap(long, action)]
        vm: PathBuf,

        /// Path reported for conflicting instance spec fields
        #[clap(long, default_value = "spec.template.spec", action)]
        field_prefix: String,

        /// Do not check the preference's resource requirements
        #[clap(long, action)]
        skip_requirements: bool,
    },

    /// Print the JSON schema of an input document
    Schema {
        #[clap(value_enum, default_value_t = SchemaKind::VirtualMachine)]
        kind: SchemaKind,
    },
}

#[derive(ValueEnum, Debug, Copy, Clone)]
enum SchemaKind {
    VirtualMachine,
    Instancetype,
    Preference,
}

impl SchemaKind {
    fn schema(self) -> RootSchema {
        match self {
            SchemaKind::VirtualMachine => schemars::schema_for!(VirtualMachine),
            SchemaKind::Instancetype => schemars::schema_for!(InstancetypeSpec),
            SchemaKind::Preference => schemars::schema_for!(PreferenceSpec),
        }
    }
}

fn parse_json_file<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> anyhow::Result<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| e.into())
}

fn create_logger(opt: &Opt) -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let level = if opt.debug { Level::Debug } else { Level::Info };
    let drain = slog::LevelFilter(drain, level).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

fn expand(
    config: &Path,
    vm: &Path,
    field_prefix: &str,
    skip_requirements: bool,
    log: &Logger,
) -> anyhow::Result<VirtualMachine> {
    let config = instancetype_config_toml::parse(config)
        .with_context(|| format!("loading {}", config.display()))?;
    let mut vm: VirtualMachine = parse_json_file(vm)
        .with_context(|| format!("reading {}", vm.display()))?;

    let instancetype = vm
        .spec
        .instancetype
        .as_ref()
        .map(|m| config.instancetype(m))
        .transpose()?;
    let preference = vm
        .spec
        .preference
        .as_ref()
        .map(|m| config.preference(m))
        .transpose()?;

    if instancetype.is_none() && preference.is_none() {
        warn!(log, "no instance type or preference referenced");
        return Ok(vm);
    }

    let applier = SpecApplier::new(log.new(o!("component" => "applier")));
    let template = &mut vm.spec.template;
    let conflicts = applier.apply(
        &FieldPath::from(field_prefix),
        instancetype,
        preference,
        &mut template.spec,
        &mut template.metadata,
    );
    if !conflicts.is_empty() {
        bail!("VM field(s) {conflicts} conflicts with selected instance type");
    }

    if skip_requirements {
        info!(log, "skipping preference requirements");
    } else {
        requirements::check(instancetype, preference, &template.spec)
            .map_err(|e| anyhow!("{e} (fields: {})", e.conflicts()))?;
    }

    if let Some(matcher) = vm.spec.instancetype.clone() {
        stamp_instancetype(&mut vm.metadata, &matcher)?;
    }
    if let Some(matcher) = vm.spec.preference.clone() {
        stamp_preference(&mut vm.metadata, &matcher)?;
    }

    Ok(vm)
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    let log = create_logger(&opt);

    match opt.cmd {
        Command::Apply { config, vm, field_prefix, skip_requirements } => {
            let vm =
                expand(&config, &vm, &field_prefix, skip_requirements, &log)?;
            info!(log, "expanded virtual machine";
                "name" => vm.metadata.name.as_deref().unwrap_or(""));
            println!("{}", serde_json::to_string_pretty(&vm)?);
        }
        Command::Schema { kind } => {
            println!("{}", serde_json::to_string_pretty(&kind.schema())?);
        }
    }
    Ok(())
}
