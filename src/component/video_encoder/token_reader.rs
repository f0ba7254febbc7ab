use std::io::{self, BufRead};

/// 以空白切割的逐字讀取器
///
/// ffmpeg 的進度行以 `\r` 覆寫，沒有可靠的換行，所以用空白分詞而不是逐行。
/// 邊讀邊產生 token，不會把整個串流讀進記憶體。
pub struct TokenReader<R> {
    reader: R,
    token: Vec<u8>,
    done: bool,
}

impl<R: BufRead> TokenReader<R> {
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            token: Vec::new(),
            done: false,
        }
    }

    /// 讀取下一個 token；串流結束回傳 `Ok(None)`
    pub fn next_token(&mut self) -> io::Result<Option<String>> {
        if self.done {
            return Ok(None);
        }

        loop {
            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            if buf.is_empty() {
                self.done = true;
                return Ok(self.take_token());
            }

            let mut consumed = 0;
            let mut finished = false;
            for &byte in buf {
                consumed += 1;
                if byte.is_ascii_whitespace() {
                    if !self.token.is_empty() {
                        finished = true;
                        break;
                    }
                } else {
                    self.token.push(byte);
                }
            }
            self.reader.consume(consumed);

            if finished {
                return Ok(self.take_token());
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn take_token(&mut self) -> Option<String> {
        if self.token.is_empty() {
            return None;
        }
        let token = String::from_utf8_lossy(&self.token).into_owned();
        self.token.clear();
        Some(token)
    }
}

impl<R: BufRead> Iterator for TokenReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn tokens(text: &str) -> Vec<String> {
        TokenReader::new(Cursor::new(text))
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_splits_on_any_whitespace() {
        assert_eq!(
            tokens("frame=  12 fps=30\rtime=00:00:01.00\n\tspeed=1.0x"),
            vec!["frame=", "12", "fps=30", "time=00:00:01.00", "speed=1.0x"]
        );
    }

    #[test]
    fn test_empty_and_blank_streams() {
        assert!(tokens("").is_empty());
        assert!(tokens(" \r\n\t ").is_empty());
    }

    #[test]
    fn test_token_spanning_buffer_boundary() {
        let text = "time=00:00:05.00 speed=12.50x";
        let reader = BufReader::with_capacity(3, Cursor::new(text));
        let collected: Vec<String> = TokenReader::new(reader).map(Result::unwrap).collect();
        assert_eq!(collected, vec!["time=00:00:05.00", "speed=12.50x"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let bytes: &[u8] = b"ok \xff\xfe end";
        let collected: Vec<String> = TokenReader::new(Cursor::new(bytes))
            .map(Result::unwrap)
            .collect();
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0], "ok");
        assert_eq!(collected[2], "end");
    }
}
