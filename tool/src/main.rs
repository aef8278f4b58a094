use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::Path;

use clap::{
    app_from_crate, crate_authors, crate_description, crate_name, crate_version, AppSettings, Arg,
    ArgMatches, SubCommand,
};

use sc2_mpq::Archive;

fn main() {
    let matches = app_from_crate!()
        .setting(AppSettings::SubcommandRequired)
        .setting(AppSettings::DisableHelpSubcommand)
        .setting(AppSettings::GlobalVersion)
        .setting(AppSettings::ColorNever)
        .subcommand(
            SubCommand::with_name("list")
                .about("lists the files in an archive")
                .arg(
                    Arg::with_name("archive")
                        .index(1)
                        .value_name("archive")
                        .help("archive file to list")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("extract")
                .about("extracts files from an archive")
                .arg(
                    Arg::with_name("archive")
                        .index(1)
                        .value_name("archive")
                        .help("archive file to extract from")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("output")
                        .value_name("dir")
                        .short("o")
                        .long("output")
                        .help("directory where to output extracted files")
                        .default_value("./")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("filter")
                        .value_name("pattern")
                        .long("filter")
                        .short("f")
                        .help("if specified, will only extract files which match the specified glob-pattern")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("view")
                .about("views a single file in an archive")
                .arg(
                    Arg::with_name("archive")
                        .index(1)
                        .value_name("archive")
                        .help("archive file to read from")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("file")
                        .index(2)
                        .value_name("filename")
                        .help("file inside the archive to view")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .get_matches_safe();

    let result = match matches {
        Err(error) => error.exit(),
        Ok(matches) => match matches.subcommand() {
            ("list", Some(matches)) => command_list(matches),
            ("extract", Some(matches)) => command_extract(matches),
            ("view", Some(matches)) => command_view(matches),
            (cmd, _) => {
                eprintln!("Unknown subcommand {} encountered", cmd);
                std::process::exit(1)
            }
        },
    };

    if let Err(error) = result {
        eprintln!("error: {}", error);
        std::process::exit(1);
    }
}

fn command_list(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let archive_path = matches.value_of("archive").unwrap();
    let mut archive = Archive::open_path(archive_path)?;

    let files = archive
        .files()
        .ok_or("archive contains no (listfile); file names are unknown")?;

    for file_name in &files {
        println!("{}", file_name);
    }

    Ok(())
}

fn command_extract(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let archive_path = matches.value_of("archive").unwrap();
    let output_dir = Path::new(matches.value_of("output").unwrap());
    let filter = match matches.value_of("filter") {
        Some(pattern) => Some(glob::Pattern::new(pattern)?),
        None => None,
    };

    let mut archive = Archive::open_path(archive_path)?;
    let files = archive
        .files()
        .ok_or("archive contains no (listfile); file names are unknown")?;

    for file_name in &files {
        if let Some(filter) = &filter {
            if !filter.matches(file_name) {
                continue;
            }
        }

        let contents = match archive.read_file(file_name) {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                eprintln!("{}: listed but not present, skipping", file_name);
                continue;
            }
            Err(error) => {
                eprintln!("{}: {}, skipping", file_name, error);
                continue;
            }
        };

        let relative = file_name.replace('\\', "/");
        let target = output_dir.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &contents)?;

        println!("{} ({} bytes)", relative, contents.len());
    }

    Ok(())
}

fn command_view(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let archive_path = matches.value_of("archive").unwrap();
    let file_name = matches.value_of("file").unwrap();

    let mut archive = Archive::open_path(archive_path)?;
    let contents = archive
        .read_file(file_name)?
        .ok_or_else(|| format!("no file named {} in the archive", file_name))?;

    std::io::stdout().write_all(&contents)?;

    Ok(())
}
