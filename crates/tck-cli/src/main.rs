use std::path::PathBuf;
use std::process::exit;

use log::info;
use tck_core::BuildMarker;
use tck_persistence::{PgDatastore, PoolProvider};

const USAGE: &str = "uso:
  tck-cli marker <dir> [--timestamp <ms>]
  tck-cli temp count <kind>
  tck-cli temp purge <kind>";

fn main() {
    // Cargar .env si existe para obtener DATABASE_URL
    let _ = dotenvy::dotenv();
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["marker", dir, rest @ ..] => marker(dir, rest),
        ["temp", "count", kind] => {
            let ds = datastore("temp count");
            match ds.count_kind(kind) {
                Ok(n) => println!("{kind}: {n}"),
                Err(e) => {
                    eprintln!("[temp count] error: {e}");
                    exit(5);
                }
            }
        }
        ["temp", "purge", kind] => {
            let ds = datastore("temp purge");
            match ds.purge_kind(kind) {
                Ok(n) => {
                    info!("purged kind={kind} count={n}");
                    println!("borrados: {n}");
                }
                Err(e) => {
                    eprintln!("[temp purge] error: {e}");
                    exit(5);
                }
            }
        }
        _ => {
            eprintln!("{USAGE}");
            exit(2);
        }
    }
}

/// Escribe `timestamp.txt` en `dir` (por defecto con la hora actual).
fn marker(dir: &str, rest: &[&str]) {
    let timestamp = match rest {
        [] => chrono::Utc::now().timestamp_millis(),
        ["--timestamp", ts] => match ts.parse::<i64>() {
            Ok(ts) => ts,
            Err(e) => {
                eprintln!("[marker] timestamp inválido `{ts}`: {e}");
                exit(2);
            }
        },
        _ => {
            eprintln!("{USAGE}");
            exit(2);
        }
    };
    match BuildMarker::write(&PathBuf::from(dir), timestamp) {
        Ok(path) => println!("{} -> {}", path.display(), BuildMarker::Stamped(timestamp).kind_for("<Type>")),
        Err(e) => {
            eprintln!("[marker] error: {e}");
            exit(5);
        }
    }
}

fn datastore(cmd: &str) -> PgDatastore<PoolProvider> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("[{cmd}] requiere DATABASE_URL para operar contra backend persistente");
        exit(4);
    }
    match tck_persistence::build_dev_pool_from_env() {
        Ok(pool) => PgDatastore::new(PoolProvider { pool }),
        Err(e) => {
            eprintln!("[{cmd}] pool error: {e}");
            exit(5);
        }
    }
}
