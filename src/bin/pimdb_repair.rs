//! Repair and diagnostic CLI for pimdb databases.
//!
//! With no command it diagnoses: version info plus a structural parity
//! check. Commands are accepted as `/flag`, `--flag`, or `-flag`. The tool
//! waits for Enter before exiting so a double-clicked console window stays
//! readable, except after `dump` and `deleteindex`, whose output is meant
//! to be piped.

use eyre::Result;
use pimdb::maintenance;
use pimdb::{DbConfig, DbError, DbStructure};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Diagnose,
    Fix,
    LowCheck,
    Rebuild,
    Defrag,
    Space,
    Backup(PathBuf),
    Restore(PathBuf),
    Dump,
    DbDump,
    DeleteIndex,
}

struct Options {
    workdir: PathBuf,
    db: String,
    command: Command,
}

fn print_usage() {
    println!("usage: pimdb-repair [command] [/workdir <dir>] [/db <name>]");
    println!();
    println!("commands (accepted as /flag, --flag or -flag):");
    println!("  (none)        diagnose: version info + structural check");
    println!("  fix           rebuild indexes of tables that fail the check");
    println!("  lowcheck      per-record low-level validation");
    println!("  rebuild       force-rebuild every index");
    println!("  defrag        compact record storage, then rebuild indexes");
    println!("  space         report wasted-space per table");
    println!("  backup <f>    write all database files into archive <f>");
    println!("  restore <f>   restore archive <f> into the working directory");
    println!("  dump          print the database structure");
    println!("  dbdump        print structure and all record contents");
    println!("  deleteindex   delete index snapshots (rebuilt on next open)");
    println!("  workdir <dir> working directory (default: current)");
    println!("  db <name>     database name (default: MyPal)");
}

fn normalize(arg: &str) -> &str {
    arg.trim_start_matches('/').trim_start_matches('-')
}

fn take_value<'a>(
    iter: &mut std::slice::Iter<'a, String>,
    what: &str,
) -> Result<&'a String> {
    iter.next()
        .ok_or_else(|| eyre::eyre!("{} needs an argument", what))
}

fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut workdir = PathBuf::from(".");
    let mut db = String::from("MyPal");
    let mut command = Command::Diagnose;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match normalize(arg) {
            "help" | "h" | "?" => return Ok(None),
            "fix" => command = Command::Fix,
            "lowcheck" => command = Command::LowCheck,
            "rebuild" => command = Command::Rebuild,
            "defrag" => command = Command::Defrag,
            "space" => command = Command::Space,
            "backup" => command = Command::Backup(take_value(&mut iter, "backup")?.into()),
            "restore" => command = Command::Restore(take_value(&mut iter, "restore")?.into()),
            "dump" => command = Command::Dump,
            "dbdump" => command = Command::DbDump,
            "deleteindex" => command = Command::DeleteIndex,
            "workdir" => workdir = take_value(&mut iter, "workdir")?.into(),
            "db" => db = take_value(&mut iter, "db")?.clone(),
            other => eyre::bail!("unknown argument '{}'", other),
        }
    }

    Ok(Some(Options {
        workdir,
        db,
        command,
    }))
}

fn run(options: &Options) -> Result<()> {
    let config = DbConfig::new(&options.workdir);
    let db = options.db.as_str();

    match &options.command {
        Command::Diagnose => {
            let info = DbStructure::load_version_info(&config, db)?;
            println!("database '{}': build {}, version {}", db, info.build, info.version);
            if maintenance::is_database_correct(&config, db)? {
                println!("structural check passed");
            } else {
                println!("structural check FAILED; run /lowcheck for details, /fix to repair");
            }
        }
        Command::Fix => {
            let structure = DbStructure::load_structure(&config, db, false)?;
            let rebuilt = maintenance::rebuild_indexes(&config, &structure, false)?;
            println!("rebuilt indexes of {} table(s)", rebuilt);
        }
        Command::LowCheck => {
            let structure = DbStructure::load_structure(&config, db, false)?;
            let report = maintenance::low_level_check(&config, &structure)?;
            for table in &report.tables {
                println!("table '{}': {} records", table.table, table.live_records);
                for problem in &table.problems {
                    println!("  problem: {}", problem);
                }
            }
            if report.is_ok() {
                println!("low-level check passed");
            } else {
                println!("low-level check found {} problem(s)", report.problem_count());
            }
        }
        Command::Rebuild => {
            let structure = DbStructure::load_structure(&config, db, false)?;
            let rebuilt = maintenance::rebuild_indexes(&config, &structure, true)?;
            println!("rebuilt indexes of {} table(s)", rebuilt);
        }
        Command::Defrag => {
            let structure = DbStructure::load_structure(&config, db, false)?;
            maintenance::defragment(&config, &structure)?;
            println!("defragmented {} table(s)", structure.tables().len());
        }
        Command::Space => {
            let structure = DbStructure::load_structure(&config, db, false)?;
            for (table, space) in maintenance::compute_wasted_space(&config, &structure)? {
                let wasted = space.total_record_count - space.normal_record_count;
                println!(
                    "table '{}': {} slots, {} live, {} wasted",
                    table, space.total_record_count, space.normal_record_count, wasted
                );
            }
        }
        Command::Backup(archive) => {
            let structure = DbStructure::load_structure(&config, db, false)?;
            maintenance::backup_database(&config, &structure, archive)?;
            println!("backup written to {}", archive.display());
        }
        Command::Restore(archive) => {
            let restored = maintenance::restore_from_backup(&config, db, archive)?;
            println!("restored {} file(s) from {}", restored.len(), archive.display());
        }
        Command::Dump => {
            let structure = DbStructure::load_structure(&config, db, false)?;
            print!("{}", maintenance::dump(&config, &structure, false)?);
        }
        Command::DbDump => {
            let structure = DbStructure::load_structure(&config, db, false)?;
            print!("{}", maintenance::dump(&config, &structure, true)?);
        }
        Command::DeleteIndex => {
            let structure = DbStructure::load_structure(&config, db, false)?;
            let removed = maintenance::delete_index_files(&config, &structure)?;
            println!("deleted {} index snapshot(s)", removed);
        }
    }
    Ok(())
}

fn wait_for_enter() {
    println!();
    println!("press Enter to exit");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: {}", e);
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let code = match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<DbError>() {
                Some(DbError::DatabaseLocked(path)) => {
                    eprintln!(
                        "error: database is in use (lock held on {}); close the application first",
                        path.display()
                    );
                }
                _ => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    };

    // Piped commands exit immediately; interactive ones keep the console up.
    if !matches!(options.command, Command::Dump | Command::DeleteIndex) {
        wait_for_enter();
    }

    code
}
