use super::types::SegmentTask;
use url::Url;

const HLS_SEG_TAG: &str = "#EXTINF";

/// Segment URLs of an HLS media playlist, in playback order.
///
/// Records are separated by CRLF. The line after each `#EXTINF` tag is taken as a segment
/// URL; everything else is ignored. Never fails: input without tags yields an empty list.
pub fn parse_playlist(content: &str) -> Vec<String> {
    let mut lines = content.split("\r\n");
    let mut segment_urls = Vec::new();

    while let Some(line) = lines.next() {
        if line.starts_with(HLS_SEG_TAG) {
            if let Some(segment_url) = lines.next() {
                segment_urls.push(segment_url.to_string());
            }
        }
    }

    segment_urls
}

/// Numbers segment URLs in playlist order, resolving relative URIs against the playlist URL.
pub fn segment_tasks(playlist_url: &str, segment_urls: Vec<String>) -> Vec<SegmentTask> {
    let base = Url::parse(playlist_url).ok();

    segment_urls
        .into_iter()
        .enumerate()
        .map(|(index, url)| {
            let source_url = match (&base, Url::parse(&url)) {
                (_, Ok(_)) => url,
                (Some(base), Err(_)) => base
                    .join(&url)
                    .map(|joined| joined.to_string())
                    .unwrap_or(url),
                (None, Err(_)) => url,
            };
            SegmentTask { index, source_url }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_segments() {
        let content = "#EXTINF:10,\r\nhttp://x/seg0.ts\r\n#EXTINF:10,\r\nhttp://x/seg1.ts\r\n";
        assert_eq!(
            parse_playlist(content),
            vec!["http://x/seg0.ts", "http://x/seg1.ts"]
        );
    }

    #[test]
    fn test_parse_ignores_other_tags() {
        let content = [
            "#EXTM3U",
            "#EXT-X-VERSION:3",
            "#EXT-X-TARGETDURATION:10",
            "#EXT-X-MEDIA-SEQUENCE:0",
            "#EXTINF:9.97,",
            "https://cdn.example/a/0.ts",
            "#EXT-X-DISCONTINUITY",
            "#EXTINF:4.2,",
            "https://cdn.example/a/1.ts",
            "#EXT-X-ENDLIST",
            "",
        ]
        .join("\r\n");

        assert_eq!(
            parse_playlist(&content),
            vec!["https://cdn.example/a/0.ts", "https://cdn.example/a/1.ts"]
        );
    }

    #[test]
    fn test_output_matches_tag_count() {
        let urls: Vec<String> = (0..25).map(|i| format!("seg{}.ts", i)).collect();
        let content: String = urls
            .iter()
            .map(|u| format!("#EXTINF:6.0,\r\n{}\r\n", u))
            .collect();

        let parsed = parse_playlist(&content);
        assert_eq!(parsed.len(), 25);
        assert_eq!(parsed, urls);
    }

    #[test]
    fn test_no_tags_is_empty() {
        assert!(parse_playlist("").is_empty());
        assert!(parse_playlist("#EXTM3U\r\n#EXT-X-ENDLIST\r\n").is_empty());
        assert!(parse_playlist("<html>not a playlist</html>").is_empty());
    }

    #[test]
    fn test_bare_newlines_are_not_separators() {
        let content = "#EXTINF:10,\nhttp://x/seg0.ts\n";
        assert!(parse_playlist(content).is_empty());
    }

    #[test]
    fn test_trailing_tag_without_url() {
        let content = "#EXTINF:10,\r\nhttp://x/seg0.ts\r\n#EXTINF:10,";
        assert_eq!(parse_playlist(content), vec!["http://x/seg0.ts"]);
    }

    #[test]
    fn test_segment_tasks_resolve_relative_urls() {
        let tasks = segment_tasks(
            "https://cdn.example/hls/720/index.m3u8?sig=1",
            vec![
                "seg0.ts".to_string(),
                "/root/seg1.ts".to_string(),
                "https://other.example/seg2.ts".to_string(),
            ],
        );

        assert_eq!(
            tasks,
            vec![
                SegmentTask {
                    index: 0,
                    source_url: "https://cdn.example/hls/720/seg0.ts".to_string()
                },
                SegmentTask {
                    index: 1,
                    source_url: "https://cdn.example/root/seg1.ts".to_string()
                },
                SegmentTask {
                    index: 2,
                    source_url: "https://other.example/seg2.ts".to_string()
                },
            ]
        );
    }
}
