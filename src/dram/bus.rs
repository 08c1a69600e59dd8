use std::fmt;
use std::sync::Arc;

use crate::config::RowBufferPolicy;

// Payloads are shared, not copied: a write hands the same buffer through the
// WRITE packet into the bank, and a read hands it back out through the DATA
// packet. Identity (Arc::ptr_eq) is the round-trip guarantee.
pub type DataPayload = Arc<Vec<u8>>;

pub const TRACER_WORD: u64 = 0xDEAD_BEEF;

// Reads from never-written locations return a fresh buffer with the tracer
// word in its first 8 bytes (little endian).
pub fn tracer_payload(transaction_size: u64) -> DataPayload {
    let mut buf = vec![0u8; transaction_size as usize];
    let word = TRACER_WORD.to_le_bytes();
    let n = word.len().min(buf.len());
    buf[..n].copy_from_slice(&word[..n]);
    Arc::new(buf)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Read,
    ReadP,
    Write,
    WriteP,
    Activate,
    Precharge,
    Refresh,
    Data,
}

impl CommandKind {
    pub fn is_column_access(self) -> bool {
        matches!(
            self,
            CommandKind::Read | CommandKind::ReadP | CommandKind::Write | CommandKind::WriteP
        )
    }

    pub fn is_read(self) -> bool {
        matches!(self, CommandKind::Read | CommandKind::ReadP)
    }

    pub fn is_write(self) -> bool {
        matches!(self, CommandKind::Write | CommandKind::WriteP)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Read => "READ",
            CommandKind::ReadP => "READ_P",
            CommandKind::Write => "WRITE",
            CommandKind::WriteP => "WRITE_P",
            CommandKind::Activate => "ACT",
            CommandKind::Precharge => "PRE",
            CommandKind::Refresh => "REF",
            CommandKind::Data => "DATA",
        };
        f.write_str(name)
    }
}

// The unit of traffic on the command and data buses.
#[derive(Debug, Clone)]
pub struct BusPacket {
    pub kind: CommandKind,
    pub addr: u64,
    pub column: u64,
    pub row: u64,
    pub rank: usize,
    pub bank: usize,
    pub data: Option<DataPayload>,
}

impl BusPacket {
    pub fn new(
        kind: CommandKind,
        addr: u64,
        column: u64,
        row: u64,
        rank: usize,
        bank: usize,
        data: Option<DataPayload>,
    ) -> Self {
        Self {
            kind,
            addr,
            column,
            row,
            rank,
            bank,
            data,
        }
    }
}

impl fmt::Display for BusPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BP [{}] pa[0x{:x}] r[{}] b[{}] row[{}] col[{}]",
            self.kind, self.addr, self.rank, self.bank, self.row, self.column
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Read,
    Write,
    ReturnData,
}

// Externally submitted request. Writes carry their payload until dispatch,
// reads are parked until the matching DATA packet comes back.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub addr: u64,
    pub data: Option<DataPayload>,
    pub time_added: u64,
}

impl Transaction {
    pub fn new(kind: TransactionKind, addr: u64, data: Option<DataPayload>) -> Self {
        Self {
            kind,
            addr,
            data,
            time_added: 0,
        }
    }

    // The column command this transaction turns into: auto-precharge
    // variants under the close-page policy, plain ones under open-page.
    pub fn column_command_kind(&self, policy: RowBufferPolicy) -> CommandKind {
        match (self.kind, policy) {
            (TransactionKind::Read, RowBufferPolicy::ClosePage) => CommandKind::ReadP,
            (TransactionKind::Read, RowBufferPolicy::OpenPage) => CommandKind::Read,
            (TransactionKind::Write, RowBufferPolicy::ClosePage) => CommandKind::WriteP,
            (TransactionKind::Write, RowBufferPolicy::OpenPage) => CommandKind::Write,
            (TransactionKind::ReturnData, _) => {
                panic!("return-data transaction has no bus command")
            }
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TransactionKind::Read => "R",
            TransactionKind::Write => "W",
            TransactionKind::ReturnData => "D",
        };
        write!(f, "T [{}] [0x{:x}]", kind, self.addr)
    }
}
