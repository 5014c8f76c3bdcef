//! Archivos de propiedades clave/valor (formato dotenv).
//!
//! Se usan para `tck.properties` y para el archivo de propiedades de
//! compatibilidad que el builder añade al despliegue. Los valores se escriben
//! siempre entre comillas para que el lector no haga sustitución de
//! variables.
use std::io::Read;
use std::path::Path;

use indexmap::IndexMap;

use crate::errors::{HarnessError, HarnessResult};

/// `true` si `key` es válida como clave (`[A-Za-z_][A-Za-z0-9_.]*`).
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

pub fn read_properties(path: &Path) -> HarnessResult<IndexMap<String, String>> {
    if !path.is_file() {
        return Err(HarnessError::MissingResource(path.display().to_string()));
    }
    let iter = dotenvy::from_path_iter(path).map_err(|e| HarnessError::config(format!("{}: {e}", path.display())))?;
    collect(iter, &path.display().to_string())
}

pub fn parse_properties<R: Read>(reader: R) -> HarnessResult<IndexMap<String, String>> {
    collect(dotenvy::from_read_iter(reader), "<inline>")
}

fn collect<I>(iter: I, origin: &str) -> HarnessResult<IndexMap<String, String>>
    where I: Iterator<Item = Result<(String, String), dotenvy::Error>>
{
    let mut out = IndexMap::new();
    for item in iter {
        let (k, v) = item.map_err(|e| HarnessError::config(format!("{origin}: {e}")))?;
        out.insert(k, v);
    }
    Ok(out)
}

/// Serializa `props` con una línea de comentario inicial.
pub fn write_properties<'a, I>(props: I, comment: &str) -> HarnessResult<String>
    where I: IntoIterator<Item = (&'a String, &'a String)>
{
    let mut out = format!("# {comment}\n");
    for (k, v) in props {
        if !is_valid_key(k) {
            return Err(HarnessError::config(format!("invalid property key `{k}`")));
        }
        out.push_str(k);
        out.push('=');
        out.push_str(&quote(v));
        out.push('\n');
    }
    Ok(out)
}

fn quote(value: &str) -> String {
    if !value.contains('\'') && !value.contains('\n') {
        return format!("'{value}'");
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
