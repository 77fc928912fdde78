/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use args::Args;
use config::Config;
use db::Database;
use fs::TableFs;

mod args;
mod config;
mod content;
mod db;
mod error;
mod fs;
mod meta;
mod namespace;
mod path_resolver;
mod schema;
mod types;

fn main() {
    let status = run();
    if let Err(ref err) = status {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logger(&config.log_config_path);
    info!("starting up, db={}, mountpoint={}", args.db, args.mountpoint);

    let database =
        Database::open(Path::new(&args.db)).with_context(|| format!("failed to open database '{}'", args.db))?;
    let filesystem = TableFs::new(database, &config);

    let fuse_args: Vec<&std::ffi::OsStr> = args
        .options
        .iter()
        .flat_map(|opt| ["-o".as_ref(), opt.as_ref()])
        .collect();

    let handle = fuse_mt::FuseMT::new(filesystem, config.worker_threads);
    fuse_mt::mount(handle, &args.mountpoint, &fuse_args)
        .with_context(|| format!("failed to mount '{}'", args.mountpoint))?;

    info!("unmounted cleanly");
    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    match std::fs::read_to_string(path) {
        Ok(text) => toml::from_str(&text).with_context(|| format!("failed to parse configuration '{path}'")),
        Err(_) => Ok(Config::default()),
    }
}

fn init_logger(path: &str) {
    if log4rs::init_file(path, Default::default()).is_err() {
        error!("no usable log config at '{path}', falling back to console logging");
        let stdout = log4rs::append::console::ConsoleAppender::builder().build();
        let root = log4rs::config::Root::builder()
            .appender("stdout")
            .build(log::LevelFilter::Info);
        if let Ok(default_config) = log4rs::Config::builder()
            .appender(log4rs::config::Appender::builder().build("stdout", Box::new(stdout)))
            .build(root)
        {
            let _ = log4rs::init_config(default_config);
        }
    }
    info!("logger initialized");
}
