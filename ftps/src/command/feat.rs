use crate::types::Features;
use crate::FtpError;

/// Parses the lines of a `FEAT` reply ([RFC 2389](https://datatracker.ietf.org/doc/html/rfc2389#section-3.2)).
///
/// - no features: `211 <text>`
/// - features: `211-<text>`, then one ` <label> [<params>]` line per feature, closed by `211 <text>`
pub fn parse_features<S: AsRef<str>>(lines: &[S]) -> Result<Features, FtpError> {
    let first_line = lines.first().ok_or(FtpError::BadResponse)?.as_ref();
    debug!("Parsing features; first line: {first_line}");

    let mut features = Features::with_capacity(lines.len());
    if first_line.starts_with("211-") {
        for line in lines.iter().skip(1).map(AsRef::as_ref) {
            if is_last_line(line) {
                break;
            }
            parse_feature(line, &mut features)?;
        }
        Ok(features)
    } else if is_last_line(first_line) {
        debug!("server advertises no features");
        Ok(features)
    } else {
        Err(FtpError::BadResponse)
    }
}

/// A feature line MUST start with a space: ` <label> [<params>]`
fn parse_feature(line: &str, features: &mut Features) -> Result<(), FtpError> {
    if !line.starts_with(' ') {
        error!("Feature line doesn't start with ` `: {line:?}");
        return Err(FtpError::BadResponse);
    }

    let mut words = line.trim().split(' ');
    let Some(name) = words.next().filter(|name| !name.is_empty()) else {
        error!("Feature line is empty");
        return Err(FtpError::BadResponse);
    };
    let params = match words.collect::<Vec<&str>>().join(" ") {
        params if params.is_empty() => None,
        params => Some(params),
    };
    trace!("supported feature: {name}: {params:?}");
    features.insert(name.to_string(), params);

    Ok(())
}

pub fn is_last_line(line: &str) -> bool {
    line.starts_with("211 ")
}
