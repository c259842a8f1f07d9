use std::path::{Path, PathBuf};

/// Replaces characters that are not allowed in file names on common filesystems.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `<output_dir>/<title>/<num>-<episode title>.ts`, numeric episode numbers padded to two digits.
pub fn episode_path(
    output_dir: &Path,
    anime_title: &str,
    num: &str,
    episode_title: &str,
) -> PathBuf {
    let num = num.trim();
    let num = match num.parse::<u32>() {
        Ok(n) => format!("{:02}", n),
        Err(_) => sanitize_file_name(num),
    };

    output_dir
        .join(sanitize_file_name(anime_title))
        .join(format!("{}-{}.ts", num, sanitize_file_name(episode_title)))
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
