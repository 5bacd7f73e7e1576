use std::process::ExitCode;

use anyhow::Context;
use deskfs::config::AppConfig;
use deskfs::logging::init_logging;
use deskfs::runtime;
use deskfs::service::{ApiResponse, FileService};
use serde::Serialize;

const USAGE: &str = "\
Usage: deskfs <command> [args]

Commands:
  tree [PATH] [--recursive]   List a folder (root by default)
  stat PATH                   Show the item at PATH
  mkdir PATH NAME             Create folder NAME inside PATH
  touch PATH NAME [CONTENT]   Create file NAME inside PATH
  rename PATH ID NEW_NAME     Rename an item
  rm PATH ID                  Delete an item and everything below it
  cp SOURCE TARGET ID         Copy an item into TARGET
  mv SOURCE TARGET ID         Move an item into TARGET

Use \"\" or / for the root folder.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Tree { path: String, recursive: bool },
    Stat { path: String },
    Mkdir { path: String, name: String },
    Touch { path: String, name: String, content: Option<String> },
    Rename { path: String, id: String, new_name: String },
    Remove { path: String, id: String },
    Copy { source: String, target: String, id: String },
    Move { source: String, target: String, id: String },
    Help,
}

fn parse_cli<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut recursive = false;
    let mut positional = Vec::new();
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--recursive" | "-r" => recursive = true,
            flag if flag.starts_with("--") => anyhow::bail!("unknown argument: {flag}"),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let Some(name) = positional.next() else {
        return Ok(Command::Help);
    };
    let rest: Vec<String> = positional.collect();
    let arity = |min: usize, max: usize| -> anyhow::Result<()> {
        if rest.len() < min || rest.len() > max {
            anyhow::bail!("wrong number of arguments for {name}\n\n{USAGE}");
        }
        Ok(())
    };

    let command = match name.as_str() {
        "tree" => {
            arity(0, 1)?;
            Command::Tree {
                path: rest.first().cloned().unwrap_or_default(),
                recursive,
            }
        }
        "stat" => {
            arity(1, 1)?;
            Command::Stat {
                path: rest[0].clone(),
            }
        }
        "mkdir" => {
            arity(2, 2)?;
            Command::Mkdir {
                path: rest[0].clone(),
                name: rest[1].clone(),
            }
        }
        "touch" => {
            arity(2, 3)?;
            Command::Touch {
                path: rest[0].clone(),
                name: rest[1].clone(),
                content: rest.get(2).cloned(),
            }
        }
        "rename" => {
            arity(3, 3)?;
            Command::Rename {
                path: rest[0].clone(),
                id: rest[1].clone(),
                new_name: rest[2].clone(),
            }
        }
        "rm" => {
            arity(2, 2)?;
            Command::Remove {
                path: rest[0].clone(),
                id: rest[1].clone(),
            }
        }
        "cp" | "mv" => {
            arity(3, 3)?;
            let (source, target, id) = (rest[0].clone(), rest[1].clone(), rest[2].clone());
            if name == "cp" {
                Command::Copy { source, target, id }
            } else {
                Command::Move { source, target, id }
            }
        }
        other => anyhow::bail!("unknown command: {other}\n\n{USAGE}"),
    };
    if recursive && !matches!(command, Command::Tree { .. }) {
        anyhow::bail!("--recursive only applies to tree");
    }
    Ok(command)
}

fn emit<T: Serialize>(response: ApiResponse<T>) -> anyhow::Result<bool> {
    let json =
        serde_json::to_string_pretty(&response.body).context("failed to encode response")?;
    println!("{json}");
    Ok(response.is_success())
}

async fn run(service: &FileService, command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Tree {
            path,
            recursive: true,
        } => emit(service.tree(&path).await),
        Command::Tree { path, .. } => emit(service.list(&path).await),
        Command::Stat { path } => emit(service.stat(&path).await),
        Command::Mkdir { path, name } => emit(service.create_folder(&path, &name).await),
        Command::Touch {
            path,
            name,
            content,
        } => {
            let size = content.as_ref().map_or(0, |content| content.len() as u64);
            emit(service.create_file(&path, &name, content, size).await)
        }
        Command::Rename { path, id, new_name } => {
            emit(service.rename(&path, &id, &new_name).await)
        }
        Command::Remove { path, id } => emit(service.delete(&path, &id).await),
        Command::Copy { source, target, id } => emit(service.copy(&source, &target, &id).await),
        Command::Move { source, target, id } => {
            emit(service.move_item(&source, &target, &id).await)
        }
        Command::Help => {
            println!("{USAGE}");
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let command = parse_cli(std::env::args())?;
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    init_logging()?;
    let config = AppConfig::from_env()?;
    let service = runtime::bootstrap(&config).await?;
    if run(&service, command).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
