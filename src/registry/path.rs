/// Resolve `relative` against the directory of the module at `from`.
///
/// `.` segments are dropped and `..` climbs one directory. A relative path
/// that does not start with `.` is still taken relative to `from`.
pub fn resolve_relative_path(from: &str, relative: &str) -> String {
    let mut segments: Vec<&str> = from.split('/').collect();
    segments.pop();

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_path() {
        assert_eq!(
            resolve_relative_path("analytics/actions/send-beacon", "./helpers/encode"),
            "analytics/actions/helpers/encode"
        );
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(
            resolve_relative_path("analytics/actions/send-beacon", "../shared/visitor"),
            "analytics/shared/visitor"
        );
        assert_eq!(
            resolve_relative_path("analytics/actions/send-beacon", "../../core/util"),
            "core/util"
        );
    }

    #[test]
    fn test_bare_relative_path() {
        assert_eq!(
            resolve_relative_path("ext/events/click", "delegate"),
            "ext/events/delegate"
        );
    }
}
