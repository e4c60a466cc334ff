//! Current-path bookkeeping for the nested tar-of-tars walk: joining a new
//! header's name onto the enclosing container, descending into a nested
//! ".tar" member, and trimming back out once a body or a nested stream
//! closes.

/// Joins a freshly read header name onto the current container path.
pub fn join(current_path: &str, name: &str) -> String {
    if current_path.is_empty() {
        name.to_string()
    } else {
        format!("{current_path}/{name}")
    }
}

/// After a leaf file's body completes, the path returns to the nearest
/// enclosing container: the rightmost path segment that itself ends in
/// ".tar". If no such segment exists the path returns to the root.
pub fn trim_to_last_tar_segment(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    match segments.iter().rposition(|segment| segment.ends_with(".tar")) {
        Some(idx) => segments[..=idx].join("/"),
        None => String::new(),
    }
}

/// Pops exactly one ".tar" segment off the current path when a nested
/// stream's own end-of-tar marker closes it. Clears the path entirely if
/// this was the outermost (top-level) stream.
pub fn pop_last_tar_segment(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    match path.rsplit_once('/') {
        Some((rest, _last)) => rest.to_string(),
        None => String::new(),
    }
}

/// `header.tar/headers/<NNNN>/meta-data` -> `NNNN`.
pub fn parse_header_meta_data_path(path: &str) -> Option<usize> {
    let rest = path.strip_prefix("header.tar/headers/")?;
    let rest = rest.strip_suffix("/meta-data")?;
    rest.parse::<usize>().ok()
}

/// `data/<NNNN>.tar` (the payload container header itself) -> `NNNN`.
pub fn parse_data_tar_container_path(path: &str) -> Option<usize> {
    let rest = path.strip_prefix("data/")?;
    let rest = rest.strip_suffix(".tar")?;
    rest.parse::<usize>().ok()
}

/// `data/<NNNN>.tar/<inner>` (a file inside the payload bundle) -> `(NNNN, inner)`.
pub fn parse_data_tar_inner_path(path: &str) -> Option<(usize, String)> {
    let rest = path.strip_prefix("data/")?;
    let (number, inner) = rest.split_once(".tar/")?;
    let index = number.parse::<usize>().ok()?;
    Some((index, inner.to_string()))
}
