//! Netscape cookie-file persistence, the seven-field tab-separated format
//! browsers and curl exchange.
//!
//! Lines carry `domain`, a subdomain flag, `path`, a secure flag, a unix
//! expiry (`0` marks a session cookie), `name` and `value`. HttpOnly
//! cookies are prefixed with `#HttpOnly_` as curl writes them.

use super::{Cookie, CookieJar};
use chrono::{TimeZone, Utc};
use log::warn;
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Result as IoResult, Write},
    path::Path,
};

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Reads a cookie file into a fresh jar.
///
/// Comments, blank lines and malformed lines are skipped; malformed lines
/// are logged with their line number. Expired cookies load as given and
/// age out through the jar's own expiry handling.
pub fn load(path: impl AsRef<Path>) -> IoResult<CookieJar> {
    let file = BufReader::new(File::open(path)?);
    let mut jar = CookieJar::new();
    for (index, line) in file.lines().enumerate() {
        match parse_line(&line?) {
            Ok(Some(cookie)) => jar.set(cookie),
            Ok(None) => {}
            Err(reason) => warn!("skipping cookie file line {}: {}", index + 1, reason),
        }
    }
    Ok(jar)
}

/// Writes the jar to a cookie file, returning how many cookies landed.
///
/// Expired cookies are never written, session cookies only when
/// `include_session` is set. Cookies scoped to a request rather than a
/// domain have no file representation and are skipped.
pub fn save(path: impl AsRef<Path>, jar: &CookieJar, include_session: bool) -> IoResult<usize> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "# Netscape HTTP Cookie File")?;
    let now = Utc::now();
    let mut written = 0;
    for cookie in jar.iter() {
        if cookie.domain().is_empty()
            || cookie.is_expired_at(now)
            || (cookie.is_session() && !include_session)
        {
            continue;
        }
        write_line(&mut file, cookie)?;
        written += 1;
    }
    file.flush()?;
    Ok(written)
}

fn parse_line(line: &str) -> Result<Option<Cookie>, &'static str> {
    let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
        Some(rest) => (rest, true),
        None => (line, false),
    };
    if line.trim().is_empty() || (!http_only && line.starts_with('#')) {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split('\t').collect();
    let [domain, subdomains, path, secure, expiry, name, value] = fields.as_slice() else {
        return Err("expected 7 tab-separated fields");
    };
    if name.is_empty() {
        return Err("empty cookie name");
    }
    if !path.starts_with('/') {
        return Err("path does not start with '/'");
    }
    // a leading dot implies the subdomain flag whatever the field says
    let host_only = !domain.starts_with('.') && *subdomains != "TRUE";
    let expiry: i64 = expiry.parse().map_err(|_| "malformed expiry")?;

    let mut cookie = Cookie::new(*name, *value)
        .set_domain(*domain)
        .set_host_only(host_only)
        .set_path(*path)
        .set_secure(*secure == "TRUE")
        .set_http_only(http_only);
    if expiry != 0 {
        let expires = Utc
            .timestamp_opt(expiry, 0)
            .single()
            .ok_or("expiry out of range")?;
        cookie = cookie.set_expires(expires);
    }
    Ok(Some(cookie))
}

fn write_line(file: &mut impl Write, cookie: &Cookie) -> IoResult<()> {
    writeln!(
        file,
        "{}{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
        if cookie.http_only() {
            HTTP_ONLY_PREFIX
        } else {
            ""
        },
        if cookie.host_only() { "" } else { "." },
        cookie.domain(),
        flag(!cookie.host_only()),
        cookie.path(),
        flag(cookie.secure()),
        cookie.expires().map(|at| at.timestamp()).unwrap_or(0),
        cookie.name(),
        cookie.value(),
    )
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use tempfile::NamedTempFile;

    fn sample_jar() -> CookieJar {
        let mut jar = CookieJar::new();
        jar.set(
            Cookie::new("id", "a3fWa")
                .set_domain("example.test")
                .set_path("/app")
                .set_expires(Utc.timestamp_opt(2_145_916_800, 0).unwrap())
                .set_secure(true),
        );
        jar.set(
            Cookie::new("tracker", "x1")
                .set_domain("sub.example.test")
                .set_host_only(true)
                .set_expires(Utc.timestamp_opt(2_145_916_800, 0).unwrap())
                .set_http_only(true),
        );
        jar.set(Cookie::new("temp", "short").set_domain("example.test"));
        jar
    }

    #[test]
    fn test_round_trip_preserves_cookies() -> Result<(), Box<dyn Error>> {
        let file = NamedTempFile::new()?;
        let jar = sample_jar();
        assert_eq!(save(file.path(), &jar, true)?, 3);
        assert_eq!(load(file.path())?, jar);
        Ok(())
    }

    #[test]
    fn test_session_cookies_are_left_out_by_default() -> Result<(), Box<dyn Error>> {
        let file = NamedTempFile::new()?;
        assert_eq!(save(file.path(), &sample_jar(), false)?, 2);
        let loaded = load(file.path())?;
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|cookie| !cookie.is_session()));
        Ok(())
    }

    #[test]
    fn test_expired_cookies_are_not_written() -> Result<(), Box<dyn Error>> {
        let file = NamedTempFile::new()?;
        let mut jar = CookieJar::new();
        jar.set(
            Cookie::new("old", "gone")
                .set_domain("example.test")
                .set_expires(Utc.timestamp_opt(1, 0).unwrap()),
        );
        assert_eq!(save(file.path(), &jar, true)?, 0);
        assert!(load(file.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_wildcard_cookies_have_no_file_form() -> Result<(), Box<dyn Error>> {
        let file = NamedTempFile::new()?;
        let mut jar = CookieJar::new();
        jar.set(Cookie::new("scoped", "nowhere"));
        assert_eq!(save(file.path(), &jar, true)?, 0);
        Ok(())
    }

    #[test]
    fn test_comments_and_malformed_lines_are_skipped() -> Result<(), Box<dyn Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "# Netscape HTTP Cookie File")?;
        writeln!(file)?;
        writeln!(file, "this line is not a cookie")?;
        writeln!(file, ".example.test\tTRUE\t/\tFALSE\t0\tgood\tvalue")?;
        writeln!(
            file,
            "{}sub.example.test\tFALSE\t/\tFALSE\t0\thidden\tsecret",
            HTTP_ONLY_PREFIX
        )?;
        file.flush()?;

        let jar = load(file.path())?;
        assert_eq!(jar.len(), 2);
        let hidden = jar
            .iter()
            .find(|cookie| cookie.name() == "hidden")
            .unwrap();
        assert!(hidden.http_only());
        assert!(hidden.host_only());
        Ok(())
    }

    #[test]
    fn test_leading_dot_overrides_the_subdomain_flag() -> Result<(), Box<dyn Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, ".example.test\tFALSE\t/\tFALSE\t0\twide\tv")?;
        file.flush()?;

        let jar = load(file.path())?;
        let cookie = jar.iter().next().unwrap();
        assert_eq!(cookie.domain(), "example.test");
        assert!(!cookie.host_only());
        Ok(())
    }
}
