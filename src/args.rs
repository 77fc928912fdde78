/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the backing SQLite database file
    #[arg(long)]
    pub db: String,

    /// Path to configuration file in TOML format
    #[arg(long, default_value_t = String::from("./tablefs.toml"))]
    pub config: String,

    /// Raw FUSE mount option, forwarded verbatim (repeatable)
    #[arg(short = 'o', long = "option")]
    pub options: Vec<String>,

    /// Where to mount the filesystem
    pub mountpoint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_and_repeated_options() {
        let args = Args::parse_from([
            "tablefs",
            "--db",
            "fs.sqlite",
            "-o",
            "allow_other",
            "-o",
            "default_permissions",
            "/mnt/tablefs",
        ]);
        assert_eq!(args.db, "fs.sqlite");
        assert_eq!(args.config, "./tablefs.toml");
        assert_eq!(args.options, vec!["allow_other", "default_permissions"]);
        assert_eq!(args.mountpoint, "/mnt/tablefs");
    }
}
