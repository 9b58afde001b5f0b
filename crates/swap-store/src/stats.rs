use regex::Regex;
use std::fmt::Write as _;
use std::sync::OnceLock;

/// Compacted levels the info string reports on. RocksDB's `rocksdb.stats`
/// property lists every level with data in it, but the renderer only ever
/// looked at L0 and L1 — carried forward unchanged rather than generalized
/// to "every level present," since nothing in this codebase's history
/// suggests that was deliberate rather than an oversight.
const REPORTED_LEVELS: usize = 2;

fn level_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*L(?P<level>\d+)\s+(?P<files>\d+)/(?P<compacting>\d+)\s+(?P<size>[\d.]+)\s*(?P<unit>B|KB|MB|GB)\s+(?P<score>[\d.]+)\s+(?P<read>[\d.]+)\s+(?P<rn>[\d.]+)\s+(?P<rnp1>[\d.]+)\s+(?P<write>[\d.]+)\s+(?P<wnew>[\d.]+)\s+(?P<moved>[\d.]+)\s+(?P<wamp>[\d.]+)\s+(?P<rd>[\d.]+)\s+(?P<wr>[\d.]+)\s+(?P<comp_sec>[\d.]+)\s+(?P<comp_merge_cpu>[\d.]+)\s+(?P<comp_cnt>\d+)\s+(?P<avg_sec>[\d.]+)\s+(?P<keyin>\S+)\s+(?P<keydrop>\S+)",
        )
        .expect("level line regex is valid")
    })
}

fn writes_line_re(kind: &str) -> Regex {
    Regex::new(&format!(
        r"{kind} writes: (?P<num>\S+) writes, (?P<keys>\S+) keys, (?P<commit_group>\S+) commit groups, (?P<per_commit_group>[\d.]+) writes per commit group, ingest: (?P<ingest>[\d.]+) (?P<ingest_unit>\S+), (?P<ingest_speed>[\d.]+) MB/s"
    ))
    .expect("writes line regex is valid")
}

fn wal_line_re(kind: &str) -> Regex {
    Regex::new(&format!(
        r"{kind} WAL: (?P<writes>\S+) writes, (?P<syncs>\S+) syncs, (?P<per_sync>[\d.]+) writes per sync, written: (?P<written>[\d.]+) (?P<written_unit>\S+), (?P<speed>[\d.]+) MB/s"
    ))
    .expect("wal line regex is valid")
}

fn stall_line_re(kind: &str) -> Regex {
    Regex::new(&format!(r"{kind} stall: (?P<time>\S+), (?P<percent>[\d.]+) percent"))
        .expect("stall line regex is valid")
}

/// Normalizes a RocksDB count string (`"19M"`, `"73K"`, `"904"`) to
/// thousands, matching the original renderer's `str2k`: a `G`/`M`/`K`
/// suffix scales to thousands directly, an unsuffixed number is divided by
/// 1000 to land in the same unit.
pub fn str_to_k(s: &str) -> Option<f64> {
    let (numeric, scale) = if let Some(n) = s.strip_suffix('G') {
        (n, 1_000_000.0)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1_000.0)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1.0)
    } else {
        (s, 1.0 / 1000.0)
    };
    numeric.parse::<f64>().ok().map(|v| v * scale)
}

fn size_to_gb(value: f64, unit: &str) -> f64 {
    match unit {
        "B" => value / (1024.0 * 1024.0 * 1024.0),
        "KB" => value / (1024.0 * 1024.0),
        "MB" => value / 1024.0,
        _ => value,
    }
}

/// Renders the `# L{level}` section for one compacted level, defaulting
/// every field to `0` when the level has no line in `rocksdb_stats` (an
/// empty store, or a level past what's populated).
fn compact_level_info(out: &mut String, level: usize, rocksdb_stats: &str) {
    let caps = level_line_re()
        .captures_iter(rocksdb_stats)
        .find(|c| c["level"].parse::<usize>().ok() == Some(level));

    let g = |name: &str| -> String {
        caps.as_ref()
            .and_then(|c| c.name(name))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "0".to_string())
    };
    let size_gb = caps
        .as_ref()
        .and_then(|c| {
            let size: f64 = c["size"].parse().ok()?;
            Some(size_to_gb(size, &c["unit"]))
        })
        .unwrap_or(0.0);

    let _ = write!(
        out,
        "# L{level}\r\n\
         TotalFiles:{}\r\n\
         CompactingFiles:{}\r\n\
         Size(GB):{size_gb:.2}\r\n\
         Score:{}\r\n\
         Read(GB):{}\r\n\
         Rn(GB):{}\r\n\
         Rnp1(GB):{}\r\n\
         Write(GB):{}\r\n\
         Wnew(GB):{}\r\n\
         Moved(GB):{}\r\n\
         W-Amp:{}\r\n\
         Rd(MB/s):{}\r\n\
         Wr(MB/s):{}\r\n\
         Comp(sec):{}\r\n\
         CompMergeCPU(sec):{}\r\n\
         Comp(cnt):{}\r\n\
         Avg(sec):{}\r\n\
         KeyIn(K):{}\r\n\
         KeyDrop(K):{}\r\n",
        g("files"),
        g("compacting"),
        g("score"),
        g("read"),
        g("rn"),
        g("rnp1"),
        g("write"),
        g("wnew"),
        g("moved"),
        g("wamp"),
        g("rd"),
        g("wr"),
        g("comp_sec"),
        g("comp_merge_cpu"),
        g("comp_cnt"),
        g("avg_sec"),
        g("keyin"),
        g("keydrop"),
    );
}

fn compact_levels_info(out: &mut String, rocksdb_stats: &str) {
    for level in 0..REPORTED_LEVELS {
        compact_level_info(out, level, rocksdb_stats);
    }
}

/// Renders the `# Cumulative`/`# Interval` section for `kind`
/// (`"cumulative"` or `"interval"`).
fn rocksdb_stats_info(out: &mut String, kind: &str, rocksdb_stats: &str) {
    let title = {
        let mut t = kind.to_string();
        if let Some(c) = t.get_mut(0..1) {
            c.make_ascii_uppercase();
        }
        t
    };

    let writes = writes_line_re(kind).captures(rocksdb_stats);
    let wal = wal_line_re(kind).captures(rocksdb_stats);
    let stall = stall_line_re(kind).captures(rocksdb_stats);

    let writes_num_k = writes.as_ref().and_then(|c| str_to_k(&c["num"])).unwrap_or(0.0);
    let writes_keys_k = writes.as_ref().and_then(|c| str_to_k(&c["keys"])).unwrap_or(0.0);
    let writes_commit_group_k = writes
        .as_ref()
        .and_then(|c| str_to_k(&c["commit_group"]))
        .unwrap_or(0.0);
    let writes_per_commit_group = writes
        .as_ref()
        .map(|c| c["per_commit_group"].to_string())
        .unwrap_or_default();
    let writes_ingest_size = writes.as_ref().map(|c| c["ingest"].to_string()).unwrap_or_default();
    let writes_ingest_size_unit = writes
        .as_ref()
        .map(|c| c["ingest_unit"].to_string())
        .unwrap_or_default();
    let writes_ingest_speed = writes
        .as_ref()
        .map(|c| c["ingest_speed"].to_string())
        .unwrap_or_default();

    let wal_writes_k = wal.as_ref().and_then(|c| str_to_k(&c["writes"])).unwrap_or(0.0);
    let wal_syncs = wal.as_ref().map(|c| c["syncs"].to_string()).unwrap_or_default();
    let wal_writes_per_sync = wal
        .as_ref()
        .map(|c| c["per_sync"].to_string())
        .unwrap_or_default();
    let wal_writen_size = wal.as_ref().map(|c| c["written"].to_string()).unwrap_or_default();
    let wal_writen_size_unit = wal
        .as_ref()
        .map(|c| c["written_unit"].to_string())
        .unwrap_or_default();
    let wal_writen_speed = wal.as_ref().map(|c| c["speed"].to_string()).unwrap_or_default();

    let stall_time = stall.as_ref().map(|c| c["time"].to_string()).unwrap_or_default();
    let stall_percent = stall.as_ref().map(|c| c["percent"].to_string()).unwrap_or_default();

    let _ = write!(
        out,
        "# {title}\r\n\
         {kind}_writes_num(K):{writes_num_k:.3}\r\n\
         {kind}_writes_keys(K):{writes_keys_k:.3}\r\n\
         {kind}_writes_commit_group(K):{writes_commit_group_k:.3}\r\n\
         {kind}_writes_per_commit_group:{writes_per_commit_group}\r\n\
         {kind}_writes_ingest_size({writes_ingest_size_unit}):{writes_ingest_size}\r\n\
         {kind}_writes_ingest_speed(MB/s):{writes_ingest_speed}\r\n\
         {kind}_wal_writes(K):{wal_writes_k:.3}\r\n\
         {kind}_wal_syncs:{wal_syncs}\r\n\
         {kind}_wal_writes_per_sync:{wal_writes_per_sync}\r\n\
         {kind}_wal_writen_size({wal_writen_size_unit}):{wal_writen_size}\r\n\
         {kind}_wal_writen_speed(MB/s):{wal_writen_speed}\r\n\
         {kind}_stall_time:{stall_time}\r\n\
         {kind}_stall_percent:{stall_percent}\r\n",
    );
}

/// Flat preamble values the caller samples from the store and filesystem
/// before rendering; everything below this is parsed out of
/// `rocksdb.stats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsPreamble {
    pub sequence: u64,
    pub used_db_size: u64,
    pub max_db_size: u64,
    pub used_disk_size: u64,
    pub disk_capacity: u64,
    pub swap_error: u64,
}

impl StatsPreamble {
    fn used_percent(&self) -> f64 {
        if self.max_db_size == 0 {
            0.0
        } else {
            self.used_db_size as f64 * 100.0 / self.max_db_size as f64
        }
    }

    fn used_disk_percent(&self) -> f64 {
        if self.disk_capacity == 0 {
            0.0
        } else {
            self.used_disk_size as f64 * 100.0 / self.disk_capacity as f64
        }
    }
}

/// Renders the full info string: flat preamble, `# L0`/`# L1`, then
/// `# Cumulative` and `# Interval`.
pub fn gen_info_string(preamble: &StatsPreamble, rocksdb_stats: &str) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "sequence:{}\r\n\
         used_db_size:{}\r\n\
         max_db_size:{}\r\n\
         used_percent:{:.2}%\r\n\
         used_disk_size:{}\r\n\
         disk_capacity:{}\r\n\
         used_disk_percent:{:.2}%\r\n\
         swap_error:{}\r\n",
        preamble.sequence,
        preamble.used_db_size,
        preamble.max_db_size,
        preamble.used_percent(),
        preamble.used_disk_size,
        preamble.disk_capacity,
        preamble.used_disk_percent(),
        preamble.swap_error,
    );
    compact_levels_info(&mut out, rocksdb_stats);
    rocksdb_stats_info(&mut out, "cumulative", rocksdb_stats);
    rocksdb_stats_info(&mut out, "interval", rocksdb_stats);
    out
}
