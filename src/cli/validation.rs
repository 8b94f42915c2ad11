//! Value parsers for CLI arguments.

use std::path::PathBuf;
use std::fs;

/// Port in 1..=65535
pub fn validate_port(port_str: &str) -> Result<u16, String> {
    let port: u16 = port_str
        .parse()
        .map_err(|_| format!("Port must be a valid number between 1 and 65535, got: '{}'", port_str))?;

    if port == 0 {
        return Err("Port must be between 1 and 65535. Port 0 is not allowed.".to_string());
    }

    Ok(port)
}

/// Existing, readable regular file (`--config`, `--catalog`)
pub fn validate_readable_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);

    if !path.exists() {
        return Err(format!("File does not exist: '{}'", value));
    }
    if !path.is_file() {
        return Err(format!("Path is not a file: '{}'", value));
    }

    fs::File::open(&path)
        .map(|_| path)
        .map_err(|e| format!("Cannot read file '{}': {}", value, e))
}

/// Worker count for `run`; at least 1
pub fn validate_concurrency(value: &str) -> Result<u32, String> {
    let concurrency: u32 = value
        .parse()
        .map_err(|_| format!("Concurrency must be a positive number, got: '{}'", value))?;

    if concurrency == 0 {
        return Err("Concurrency must be at least 1".to_string());
    }

    Ok(concurrency)
}

/// Rule set and document ids: non-empty, no whitespace
pub fn validate_identifier(value: &str) -> Result<String, String> {
    let id = value.trim();

    if id.is_empty() {
        return Err("Id cannot be empty".to_string());
    }

    if id.chars().any(char::is_whitespace) {
        return Err(format!("Id cannot contain whitespace: '{}'", value));
    }

    Ok(id.to_string())
}

/// Validate host address format (basic validation)
pub fn validate_host_address(host_str: &str) -> Result<String, String> {
    let host = host_str.trim();

    if host.is_empty() {
        return Err("Host address cannot be empty".to_string());
    }

    // Check for common invalid characters
    if host.contains(' ') {
        return Err("Host address cannot contain spaces".to_string());
    }

    // Basic validation for common formats
    if host == "localhost" || host == "0.0.0.0" || host.starts_with("127.") {
        return Ok(host.to_string());
    }

    // Basic IPv4 validation
    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        let parts: Vec<&str> = host.split('.').collect();
        if parts.len() == 4 {
            for part in parts {
                if part.parse::<u8>().is_err() {
                    return Err(format!("Invalid IPv4 address format: '{}'", host_str));
                }
            }
            return Ok(host.to_string());
        }
    }

    // For other formats (hostnames, IPv6), do basic validation
    if host.len() > 253 {
        return Err("Host address is too long (maximum 253 characters)".to_string());
    }

    // Allow hostnames and other valid formats
    Ok(host.to_string())
}
