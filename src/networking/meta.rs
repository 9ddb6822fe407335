use chrono::Utc;

/// File name and version token a remote endpoint reported for a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMeta {
    pub file_name: String,
    pub version: String,
}

/// Resolve the remote file name and version token from response metadata.
///
/// The file name comes from the `content-disposition` header when present
/// and parseable, otherwise from the final path segment of the URL. The
/// version token is the `-v<token>.<ext>` portion of that name; names
/// without one get a fresh wall-clock token, so they always read as newer
/// than whatever is stored locally.
pub fn resolve(url: &str, disposition: Option<&str>) -> RemoteMeta {
    let file_name = disposition
        .and_then(file_name_from_disposition)
        .or_else(|| file_name_from_url(url))
        .unwrap_or_default();
    let version = version_from_file_name(&file_name).unwrap_or_else(synthesized_token);
    RemoteMeta { file_name, version }
}

/// Pull the `filename` parameter out of a `content-disposition` value.
fn file_name_from_disposition(value: &str) -> Option<String> {
    value.split(';').find_map(|param| {
        let name = param.trim().strip_prefix("filename=")?.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_owned())
    })
}

/// Final path segment of the URL, without any query or fragment.
fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.rsplit('/').next()?;
    (!segment.is_empty()).then(|| segment.to_owned())
}

/// Extract `<token>` from a `<name>-v<token>.<ext>` file name.
fn version_from_file_name(name: &str) -> Option<String> {
    let (_, rest) = name.split_once("-v")?;
    let rest = match rest.find("-v") {
        Some(next) => &rest[..next],
        None => rest,
    };
    let token = match rest.rsplit_once('.') {
        Some((token, _ext)) => token,
        None => rest,
    };
    (!token.is_empty()).then(|| token.to_owned())
}

fn synthesized_token() -> String {
    Utc::now().timestamp().to_string()
}
