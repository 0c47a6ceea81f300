use std::fmt;

/// 中断端点一次读取的最大字节数
pub const REPORT_BUFFER_SIZE: usize = 0x40;

/// 从物理设备读到的一个原始报告
///
/// 缓冲区大小固定, `len` 记录实际收到的字节数
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawReport {
    data: [u8; REPORT_BUFFER_SIZE],
    len: usize,
}

impl RawReport {
    /// 超出缓冲区的部分会被截断
    pub fn new(bytes: &[u8]) -> Self {
        let len = bytes.len().min(REPORT_BUFFER_SIZE);
        let mut data = [0u8; REPORT_BUFFER_SIZE];
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for RawReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawReport[")?;
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        write!(f, "]")
    }
}
