use anyhow::Result;

/// Playlist and ICY metadata parsing shared by the stream collaborators
pub struct ParsingUtils;

impl ParsingUtils {
    /// Parse a .pls playlist file to extract the first stream URL
    pub fn parse_pls_content(content: &str) -> Result<String> {
        for line in content.lines() {
            let line = line.trim();
            if let Some(url) = line.strip_prefix("File1=") {
                return Ok(url.trim().to_string());
            }
        }
        anyhow::bail!("No stream URL found in .pls file")
    }

    /// Parse a .m3u/.m3u8 playlist to extract the first stream URL
    pub fn parse_m3u_content(content: &str) -> Result<String> {
        content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("No stream URL found in .m3u file"))
    }

    /// Determine if a URL points at a playlist rather than the audio itself
    pub fn is_playlist_url(url: &str) -> bool {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        path.ends_with(".pls") || path.ends_with(".m3u") || path.ends_with(".m3u8")
    }

    /// Pick the first stream URL out of a downloaded playlist
    pub fn parse_playlist(url: &str, content: &str) -> Result<String> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.ends_with(".pls") {
            Self::parse_pls_content(content)
        } else {
            Self::parse_m3u_content(content)
        }
    }

    /// Extract the `StreamTitle` value from an ICY metadata block
    pub fn parse_stream_title(metadata: &str) -> Option<String> {
        const START: &str = "StreamTitle='";
        let begin = metadata.find(START)? + START.len();
        let rest = &metadata[begin..];
        let end = rest.find("';").unwrap_or_else(|| rest.trim_end_matches('\'').len());
        let title = rest[..end].trim();
        if title.is_empty() {
            None
        } else {
            Some(title.to_string())
        }
    }
}

/// Splits an ICY stream into audio bytes and metadata blocks.
///
/// Every `metaint` audio bytes the server inserts one length byte (in units
/// of 16) followed by that many bytes of metadata.
#[derive(Debug)]
pub struct IcyMetadataReader {
    metaint: usize,
    audio_remaining: usize,
    meta_len: Option<usize>,
    meta_buf: Vec<u8>,
}

impl IcyMetadataReader {
    pub fn new(metaint: usize) -> Self {
        Self {
            metaint,
            audio_remaining: metaint,
            meta_len: None,
            meta_buf: Vec::new(),
        }
    }

    /// Feed a network chunk; returns every metadata block completed by it.
    pub fn feed(&mut self, mut data: &[u8]) -> Vec<String> {
        let mut blocks = Vec::new();

        while !data.is_empty() {
            match self.meta_len {
                None if self.audio_remaining > 0 => {
                    let n = self.audio_remaining.min(data.len());
                    self.audio_remaining -= n;
                    data = &data[n..];
                }
                None => {
                    let len = data[0] as usize * 16;
                    data = &data[1..];
                    if len == 0 {
                        self.audio_remaining = self.metaint;
                    } else {
                        self.meta_buf.clear();
                        self.meta_len = Some(len);
                    }
                }
                Some(len) => {
                    let n = (len - self.meta_buf.len()).min(data.len());
                    self.meta_buf.extend_from_slice(&data[..n]);
                    data = &data[n..];
                    if self.meta_buf.len() == len {
                        let block = String::from_utf8_lossy(&self.meta_buf);
                        blocks.push(block.trim_end_matches('\0').to_string());
                        self.meta_len = None;
                        self.audio_remaining = self.metaint;
                    }
                }
            }
        }

        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icy_block(meta: &str) -> Vec<u8> {
        let padded = meta.len().div_ceil(16) * 16;
        let mut out = vec![(padded / 16) as u8];
        out.extend_from_slice(meta.as_bytes());
        out.resize(padded + 1, 0);
        out
    }

    #[test]
    fn test_parse_pls_content() {
        let content = r#"[playlist]
NumberOfEntries=1
File1=http://prem2.di.fm:80/trance_hi
Title1=Digitally Imported - Trance
Length1=-1
Version=2"#;

        let result = ParsingUtils::parse_pls_content(content).unwrap();
        assert_eq!(result, "http://prem2.di.fm:80/trance_hi");
    }

    #[test]
    fn test_parse_pls_content_missing_file() {
        let content = r#"[playlist]
NumberOfEntries=1
Title1=Example Stream
Length1=-1
Version=2"#;

        assert!(ParsingUtils::parse_pls_content(content).is_err());
    }

    #[test]
    fn test_parse_m3u_content() {
        let content = "#EXTM3U\n#EXTINF:-1,Trance\n\nhttp://prem1.di.fm/trance\n";
        assert_eq!(
            ParsingUtils::parse_m3u_content(content).unwrap(),
            "http://prem1.di.fm/trance"
        );
        assert!(ParsingUtils::parse_m3u_content("#EXTM3U\n").is_err());
    }

    #[test]
    fn test_is_playlist_url() {
        assert!(ParsingUtils::is_playlist_url("http://listen.di.fm/premium_high/trance.pls?abc"));
        assert!(ParsingUtils::is_playlist_url("http://example.com/stream.m3u"));
        assert!(!ParsingUtils::is_playlist_url("http://example.com/stream.mp3"));
    }

    #[test]
    fn test_parse_playlist_dispatches_on_extension() {
        let pls = "[playlist]\nFile1=http://a/1\n";
        let from_pls = ParsingUtils::parse_playlist("http://x/t.pls?key", pls).unwrap();
        let from_m3u = ParsingUtils::parse_playlist("http://x/t.m3u", "http://a/2\n").unwrap();
        assert_eq!(from_pls, "http://a/1");
        assert_eq!(from_m3u, "http://a/2");
    }

    #[test]
    fn test_parse_stream_title() {
        assert_eq!(
            ParsingUtils::parse_stream_title("StreamTitle='Ferry Corsten - Punk';StreamUrl='';"),
            Some("Ferry Corsten - Punk".to_string())
        );
        assert_eq!(ParsingUtils::parse_stream_title("StreamTitle='';"), None);
        assert_eq!(ParsingUtils::parse_stream_title("StreamUrl='x';"), None);
    }

    #[test]
    fn test_icy_reader_extracts_blocks_across_chunks() {
        let mut stream = vec![0xAA; 8];
        stream.extend(icy_block("StreamTitle='A - B';"));
        stream.extend(vec![0xBB; 8]);
        stream.push(0);
        stream.extend(vec![0xCC; 8]);
        stream.extend(icy_block("StreamTitle='C - D';"));

        let mut reader = IcyMetadataReader::new(8);
        let mut blocks = Vec::new();
        for chunk in stream.chunks(5) {
            blocks.extend(reader.feed(chunk));
        }

        assert_eq!(blocks, vec!["StreamTitle='A - B';", "StreamTitle='C - D';"]);
    }
}
