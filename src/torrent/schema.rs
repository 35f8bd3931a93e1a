//! Metainfo schema validation
//!
//! Structural checks on a decoded metainfo dictionary. Validation and
//! extraction happen in one pass: a dictionary that passes comes back as a
//! typed [`TorrentInfo`] (with the info-hash left zeroed for the caller).

use serde_bencode::value::Value;
use url::Url;

use crate::error::{Result, TorrentError};
use crate::torrent::info::{TorrentFile, TorrentInfo};
use crate::torrent::parser::{Dict, ValueExt};

/// URL schemes accepted for trackers
pub const URL_SCHEMES: &[&str] = &["http", "https", "udp", "udps", "ftp", "ftps", "dht", "dhts", "ws", "wss"];

/// Whether `s` is an absolute tracker URL with a host
pub fn is_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => URL_SCHEMES.contains(&url.scheme()) && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Check a typed announce-list
pub fn check_announce_list(list: &[Vec<String>]) -> Result<()> {
    for tier in list {
        for url in tier {
            if !is_url(url) {
                return Err(TorrentError::validation_error_with_field(
                    format!("Item in `announce-list` list is not a URL: {}", url),
                    "announce_list",
                ));
            }
        }
    }
    Ok(())
}

fn fail<T>(message: &str) -> Result<T> {
    Err(TorrentError::schema_error(message))
}

fn get<'a>(dict: &'a Dict, key: &str) -> Option<&'a Value> {
    dict.get(key.as_bytes())
}

/// Optional UTF-8 string field
fn optional_str(dict: &Dict, key: &str) -> Result<Option<String>> {
    match get(dict, key) {
        None => Ok(None),
        Some(value) => match value.as_str() {
            Some(s) => Ok(Some(s.to_string())),
            None => fail(&format!("`{}` is not a string", key)),
        },
    }
}

fn non_negative(value: &Value) -> Option<u64> {
    value.as_int().and_then(|i| u64::try_from(i).ok())
}

fn check_md5sum(dict: &Dict) -> Result<Option<String>> {
    match get(dict, "md5sum") {
        None => Ok(None),
        Some(value) => {
            let Some(sum) = value.as_str() else {
                return fail("`md5sum` is not a string");
            };
            if sum.len() != 32 || !sum.bytes().all(|b| b.is_ascii_hexdigit()) {
                return fail("`md5sum` is not a 32 length hex in file");
            }
            Ok(Some(sum.to_string()))
        }
    }
}

fn check_announce(root: &Dict) -> Result<String> {
    match get(root, "announce") {
        None => {
            let has_list = get(root, "announce-list")
                .and_then(ValueExt::as_list)
                .is_some_and(|l| !l.is_empty());
            if has_list {
                Ok(String::new())
            } else {
                fail("`announce` and `announce-list` fields not found")
            }
        }
        Some(value) => {
            let Some(announce) = value.as_str() else {
                return fail("`announce` is not a string");
            };
            if !is_url(announce) {
                return fail("`announce` is not a URL");
            }
            Ok(announce.to_string())
        }
    }
}

fn check_announce_tiers(root: &Dict) -> Result<Vec<Vec<String>>> {
    let Some(value) = get(root, "announce-list") else {
        return Ok(Vec::new());
    };
    let Some(tiers) = value.as_list() else {
        return fail("`announce-list` is not a list");
    };

    let mut list = Vec::with_capacity(tiers.len());
    for tier in tiers {
        let Some(urls) = tier.as_list() else {
            return fail("`announce-list` is not a list of lists");
        };
        let mut parsed = Vec::with_capacity(urls.len());
        for url in urls {
            let Some(url) = url.as_str() else {
                return fail("Field in `announce-list` is not a string");
            };
            if !is_url(url) {
                return fail("Item in `announce-list` list is not a URL");
            }
            parsed.push(url.to_string());
        }
        list.push(parsed);
    }
    Ok(list)
}

fn check_url_list(root: &Dict) -> Result<Vec<String>> {
    match get(root, "url-list") {
        None => Ok(Vec::new()),
        Some(value) => {
            if let Some(url) = value.as_str() {
                return Ok(if url.is_empty() { Vec::new() } else { vec![url.to_string()] });
            }
            let Some(urls) = value.as_list() else {
                return fail("`url-list` is not a string or list of strings");
            };
            urls.iter()
                .map(|u| {
                    u.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| TorrentError::schema_error("`url-list` is not a string or list of strings"))
                })
                .collect()
        }
    }
}

fn check_files(files: &Value) -> Result<Vec<TorrentFile>> {
    let Some(files) = files.as_list() else {
        return fail("`info.files` is not a list");
    };

    let mut parsed = Vec::with_capacity(files.len());
    for file in files {
        let Some(file) = file.as_dict() else {
            return fail("File in `info.files` is not a dictionary");
        };
        let Some(length) = get(file, "length") else {
            return fail("`length` field not found in file");
        };
        let Some(length) = non_negative(length) else {
            return fail("`length` is not a positive integer in file");
        };
        let md5sum = check_md5sum(file)?;
        let Some(path) = get(file, "path") else {
            return fail("`path` field not found in file");
        };
        let Some(path) = path.as_list() else {
            return fail("`path` is not a list in file");
        };
        let path = path
            .iter()
            .map(|p| {
                p.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| TorrentError::schema_error("`path` is not a list of strings in file"))
            })
            .collect::<Result<Vec<_>>>()?;
        parsed.push(TorrentFile { path, length, md5sum });
    }
    Ok(parsed)
}

/// Validate a decoded metainfo and extract its typed view
pub fn validate(value: &Value) -> Result<TorrentInfo> {
    let Some(root) = value.as_dict() else {
        return fail("Torrent is not a dictionary");
    };
    validate_dict(root)
}

/// [`validate`] for an already unwrapped root dictionary
pub fn validate_dict(root: &Dict) -> Result<TorrentInfo> {
    let announce = check_announce(root)?;
    let announce_list = check_announce_tiers(root)?;

    let creation_date = match get(root, "creation date") {
        None => None,
        Some(value) => match value.as_int() {
            Some(date) => Some(date),
            None => return fail("`creation date` is not an integer"),
        },
    };
    let comment = optional_str(root, "comment")?;
    let created_by = optional_str(root, "created by")?;
    optional_str(root, "encoding")?;
    let url_list = check_url_list(root)?;

    let Some(info) = get(root, "info") else {
        return fail("`info` field not found");
    };
    let Some(info) = info.as_dict() else {
        return fail("`info` is not a dictionary");
    };

    let (length, md5sum, files) = match get(info, "files") {
        Some(files) => {
            let files = check_files(files)?;
            if get(info, "length").is_some() {
                return fail("Cannot have `info.length` in multi file mode");
            }
            if get(info, "md5sum").is_some() {
                return fail("Cannot have `info.md5sum` in multi file mode");
            }
            (None, None, Some(files))
        }
        None => {
            let Some(length) = get(info, "length") else {
                return fail("`info.length` not found in single file mode");
            };
            let Some(length) = non_negative(length) else {
                return fail("`info.length` is not a positive integer in file");
            };
            (Some(length), check_md5sum(info)?, None)
        }
    };

    let Some(name) = get(info, "name") else {
        return fail("`info.name` not found");
    };
    let Some(name) = name.as_str() else {
        return fail("`name` is not a string");
    };

    let Some(piece_length) = get(info, "piece length") else {
        return fail("`info.piece length` not found");
    };
    let Some(piece_length) = non_negative(piece_length).filter(|&l| l > 0) else {
        return fail("`info.piece length` is not a positive integer");
    };

    let Some(pieces) = get(info, "pieces") else {
        return fail("`info.pieces` not found");
    };
    let Some(pieces) = pieces.as_bytes() else {
        return fail("`info.pieces` is not a byte string");
    };
    let pieces = TorrentInfo::parse_piece_hashes(pieces)?;

    let private = match get(info, "private").map(ValueExt::as_int) {
        None => false,
        Some(Some(0)) => false,
        Some(Some(1)) => true,
        Some(_) => return fail("`info.private` can only be 0 or 1"),
    };
    let source = optional_str(info, "source")?;

    Ok(TorrentInfo {
        announce,
        announce_list,
        comment,
        created_by,
        creation_date,
        url_list,
        info_hash: [0u8; 20],
        piece_length,
        pieces,
        name: name.to_string(),
        private,
        source,
        length,
        md5sum,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent::parser::string;

    fn dict(entries: Vec<(&str, Value)>) -> Value {
        Value::Dict(entries.into_iter().map(|(k, v)| (k.as_bytes().to_vec(), v)).collect())
    }

    fn info() -> Dict {
        let Value::Dict(info) = dict(vec![
            ("name", string("magic")),
            ("piece length", Value::Int(262144)),
            ("pieces", Value::Bytes(vec![0u8; 20])),
            ("length", Value::Int(20)),
        ]) else {
            unreachable!()
        };
        info
    }

    fn torrent() -> Dict {
        let Value::Dict(root) = dict(vec![
            ("announce", string("http://tracker.com/1234")),
            ("info", Value::Dict(info())),
        ]) else {
            unreachable!()
        };
        root
    }

    fn message(root: Dict) -> String {
        match validate(&Value::Dict(root)) {
            Err(TorrentError::SchemaError { message }) => message,
            other => panic!("expected a schema error, got {:?}", other),
        }
    }

    fn with_info(change: impl FnOnce(&mut Dict)) -> Dict {
        let mut root = torrent();
        let mut info = info();
        change(&mut info);
        root.insert(b"info".to_vec(), Value::Dict(info));
        root
    }

    fn files(list: Vec<Value>) -> Dict {
        let mut root = torrent();
        root.insert(b"info".to_vec(), dict(vec![("files", Value::List(list))]));
        root
    }

    #[test]
    fn test_valid_single_file() {
        let parsed = validate(&Value::Dict(torrent())).unwrap();
        assert_eq!(parsed.name, "magic");
        assert_eq!(parsed.length, Some(20));
        assert_eq!(parsed.pieces.len(), 1);
        assert!(!parsed.private);
    }

    #[test]
    fn test_announce_checks() {
        let mut root = torrent();
        root.remove(b"announce".as_slice());
        assert_eq!(message(root), "`announce` and `announce-list` fields not found");

        let mut root = torrent();
        root.insert(b"announce".to_vec(), Value::Int(43));
        assert_eq!(message(root), "`announce` is not a string");

        let mut root = torrent();
        root.insert(b"announce".to_vec(), string("LOL"));
        assert_eq!(message(root), "`announce` is not a URL");
    }

    #[test]
    fn test_announce_list_only_is_accepted() {
        let mut root = torrent();
        root.remove(b"announce".as_slice());
        root.insert(
            b"announce-list".to_vec(),
            Value::List(vec![Value::List(vec![string("udp://tracker.example.org:80")])]),
        );
        let parsed = validate(&Value::Dict(root)).unwrap();
        assert!(parsed.announce.is_empty());
        assert_eq!(parsed.trackers(), vec!["udp://tracker.example.org:80"]);
    }

    #[test]
    fn test_announce_list_checks() {
        let mut root = torrent();
        root.insert(b"announce-list".to_vec(), string("no"));
        assert_eq!(message(root), "`announce-list` is not a list");

        let mut root = torrent();
        root.insert(b"announce-list".to_vec(), Value::List(vec![string("no")]));
        assert_eq!(message(root), "`announce-list` is not a list of lists");

        let mut root = torrent();
        root.insert(b"announce-list".to_vec(), Value::List(vec![Value::List(vec![Value::Int(1)])]));
        assert_eq!(message(root), "Field in `announce-list` is not a string");

        let mut root = torrent();
        root.insert(b"announce-list".to_vec(), Value::List(vec![Value::List(vec![string("nope")])]));
        assert_eq!(message(root), "Item in `announce-list` list is not a URL");
    }

    #[test]
    fn test_top_level_fields() {
        let mut root = torrent();
        root.insert(b"creation date".to_vec(), string("hello"));
        assert_eq!(message(root), "`creation date` is not an integer");

        let mut root = torrent();
        root.insert(b"comment".to_vec(), Value::Int(2));
        assert_eq!(message(root), "`comment` is not a string");

        let mut root = torrent();
        root.insert(b"created by".to_vec(), Value::List(vec![]));
        assert_eq!(message(root), "`created by` is not a string");

        let mut root = torrent();
        root.insert(b"encoding".to_vec(), Value::List(vec![]));
        assert_eq!(message(root), "`encoding` is not a string");

        let mut root = torrent();
        root.remove(b"info".as_slice());
        assert_eq!(message(root), "`info` field not found");
    }

    #[test]
    fn test_multi_file_checks() {
        let mut root = torrent();
        root.insert(b"info".to_vec(), dict(vec![("files", string("no"))]));
        assert_eq!(message(root), "`info.files` is not a list");

        assert_eq!(message(files(vec![dict(vec![])])), "`length` field not found in file");
        assert_eq!(
            message(files(vec![dict(vec![("length", string("never"))])])),
            "`length` is not a positive integer in file"
        );
        assert_eq!(
            message(files(vec![dict(vec![("length", Value::Int(-1))])])),
            "`length` is not a positive integer in file"
        );
        assert_eq!(
            message(files(vec![dict(vec![("length", Value::Int(1)), ("md5sum", Value::Int(0))])])),
            "`md5sum` is not a string"
        );
        assert_eq!(
            message(files(vec![dict(vec![("length", Value::Int(1)), ("md5sum", string("ohoh"))])])),
            "`md5sum` is not a 32 length hex in file"
        );
        assert_eq!(
            message(files(vec![dict(vec![("length", Value::Int(1))])])),
            "`path` field not found in file"
        );
        assert_eq!(
            message(files(vec![dict(vec![("length", Value::Int(1)), ("path", Value::Int(1))])])),
            "`path` is not a list in file"
        );
        assert_eq!(
            message(files(vec![dict(vec![
                ("length", Value::Int(1)),
                ("path", Value::List(vec![Value::Int(1)]))
            ])])),
            "`path` is not a list of strings in file"
        );
    }

    #[test]
    fn test_mixed_mode_rejected() {
        let file = || dict(vec![("length", Value::Int(1)), ("path", Value::List(vec![string("k")]))]);

        let root = with_info(|info| {
            info.insert(b"files".to_vec(), Value::List(vec![file()]));
        });
        assert_eq!(message(root), "Cannot have `info.length` in multi file mode");

        let root = with_info(|info| {
            info.remove(b"length".as_slice());
            info.insert(b"files".to_vec(), Value::List(vec![file()]));
            info.insert(b"md5sum".to_vec(), Value::Int(1));
        });
        assert_eq!(message(root), "Cannot have `info.md5sum` in multi file mode");
    }

    #[test]
    fn test_info_fields() {
        // (key, replacement or None to remove, expected message)
        let cases: Vec<(&str, Option<Value>, &str)> = vec![
            ("length", None, "`info.length` not found in single file mode"),
            ("length", Some(string("no")), "`info.length` is not a positive integer in file"),
            ("name", Some(Value::Int(1)), "`name` is not a string"),
            ("piece length", None, "`info.piece length` not found"),
            ("piece length", Some(string("n")), "`info.piece length` is not a positive integer"),
            ("piece length", Some(Value::Int(0)), "`info.piece length` is not a positive integer"),
            ("pieces", None, "`info.pieces` not found"),
            ("pieces", Some(Value::Int(0)), "`info.pieces` is not a byte string"),
            ("pieces", Some(Value::Bytes(vec![0u8; 19])), "`info.pieces` length is not divisible by 20"),
            ("private", Some(Value::Int(3)), "`info.private` can only be 0 or 1"),
            ("source", Some(Value::Int(4)), "`source` is not a string"),
        ];

        for (key, replacement, expected) in cases {
            let root = with_info(|info| match replacement {
                Some(value) => {
                    info.insert(key.as_bytes().to_vec(), value);
                }
                None => {
                    info.remove(key.as_bytes());
                }
            });
            assert_eq!(message(root), expected, "case `{}`", key);
        }
    }

    #[test]
    fn test_url_list_forms() {
        let mut root = torrent();
        root.insert(b"url-list".to_vec(), string("http://seed.example.com/file"));
        assert_eq!(validate(&Value::Dict(root)).unwrap().url_list.len(), 1);

        let mut root = torrent();
        root.insert(
            b"url-list".to_vec(),
            Value::List(vec![string("http://a.example.com/"), string("http://b.example.com/")]),
        );
        assert_eq!(validate(&Value::Dict(root)).unwrap().url_list.len(), 2);

        let mut root = torrent();
        root.insert(b"url-list".to_vec(), Value::Int(1));
        assert_eq!(message(root), "`url-list` is not a string or list of strings");
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("http://hello.2u"));
        assert!(is_url("udp://tracker.publicbt.com:80"));
        assert!(is_url("wss://tracker.example.com/announce"));
        assert!(!is_url("LOL"));
        assert!(!is_url("mailto:someone@example.com"));
        assert!(!is_url("file:///etc/passwd"));
    }

    #[test]
    fn test_check_announce_list() {
        let good = vec![vec!["http://a.example.com/announce".to_string()]];
        assert!(check_announce_list(&good).is_ok());
        let bad = vec![vec!["nope".to_string()]];
        assert!(matches!(
            check_announce_list(&bad),
            Err(TorrentError::ValidationError { .. })
        ));
    }
}
