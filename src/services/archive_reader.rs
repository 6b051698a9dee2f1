//! Streaming reader for yearly XML archives.
//!
//! Walks the document event by event, materializes one station element at a
//! time and hands out bounded batches of records, so memory use does not
//! depend on the file size. The iterator is finite and cannot be restarted.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::source_record::SourceRecord;
use crate::transform::{AdapterOutput, RawArchivePrice, RawArchiveStation, XmlArchiveAdapter};

/// Batches buffered between the blocking reader and the async loader
const CHANNEL_CAPACITY: usize = 2;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed archive XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("archive ended inside a station element")]
    Truncated,

    #[error("archive reader cancelled")]
    Cancelled,
}

/// Counters for one archive pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub stations: usize,
    pub records: usize,
    pub skipped_prices: usize,
    pub skipped_stations: usize,
    pub batches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Address,
    City,
}

/// What one XML event means for the reader, detached from the event buffer
enum Step {
    Station {
        station: RawArchiveStation,
        closed: bool,
    },
    Price(RawArchivePrice),
    TextStart(TextField),
    Text(Option<String>),
    TextEnd,
    StationEnd,
    Eof,
    Failed(quick_xml::Error),
    Skip,
}

pub struct ArchiveReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    batch_size: usize,
    adapter: XmlArchiveAdapter,
    pending: AdapterOutput,
    current: Option<RawArchiveStation>,
    text_target: Option<TextField>,
    stats: ArchiveStats,
    finished: bool,
}

impl ArchiveReader<BufReader<File>> {
    pub fn open(path: &Path, batch_size: usize) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file), batch_size))
    }
}

impl<R: BufRead> ArchiveReader<R> {
    /// `batch_size` is clamped to at least one record
    pub fn new(source: R, batch_size: usize) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);

        Self {
            reader,
            buf: Vec::new(),
            batch_size: batch_size.max(1),
            adapter: XmlArchiveAdapter,
            pending: AdapterOutput::default(),
            current: None,
            text_target: None,
            stats: ArchiveStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> ArchiveStats {
        ArchiveStats {
            skipped_prices: self.pending.skipped_prices,
            skipped_stations: self.pending.skipped_stations,
            ..self.stats.clone()
        }
    }

    fn read_step(&mut self) -> Step {
        self.buf.clear();
        let decoder = self.reader.decoder();

        match self.reader.read_event_into(&mut self.buf) {
            Ok(Event::Start(e)) => open_step(&e, decoder, false),
            Ok(Event::Empty(e)) => open_step(&e, decoder, true),
            Ok(Event::Text(text)) => Step::Text(text.unescape().ok().map(Cow::into_owned)),
            Ok(Event::CData(data)) => Step::Text(decoder.decode(&data).ok().map(Cow::into_owned)),
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"pdv" => Step::StationEnd,
                b"adresse" | b"ville" => Step::TextEnd,
                _ => Step::Skip,
            },
            Ok(Event::Eof) => Step::Eof,
            Ok(_) => Step::Skip,
            Err(source) => Step::Failed(source),
        }
    }

    fn take_batch(&mut self, len: usize) -> Vec<SourceRecord> {
        let batch: Vec<SourceRecord> = self.pending.records.drain(..len).collect();
        self.stats.records += batch.len();
        self.stats.batches += 1;
        batch
    }

    fn finish_station(&mut self) {
        if let Some(station) = self.current.take() {
            self.stats.stations += 1;
            self.adapter.adapt_station(&station, &mut self.pending);
        }
        self.text_target = None;
    }

    fn fail(&mut self, error: ArchiveError) -> Option<Result<Vec<SourceRecord>, ArchiveError>> {
        self.finished = true;
        self.pending.records.clear();
        Some(Err(error))
    }
}

impl<R: BufRead> Iterator for ArchiveReader<R> {
    type Item = Result<Vec<SourceRecord>, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if self.pending.records.len() >= self.batch_size {
                return Some(Ok(self.take_batch(self.batch_size)));
            }

            match self.read_step() {
                Step::Station { station, closed } => {
                    // A station left open is closed by the next one
                    self.finish_station();
                    self.current = Some(station);
                    if closed {
                        self.finish_station();
                    }
                }
                Step::Price(price) => match self.current.as_mut() {
                    Some(station) => station.prices.push(price),
                    None => self.pending.skipped_prices += 1,
                },
                Step::TextStart(field) => {
                    if self.current.is_some() {
                        self.text_target = Some(field);
                    }
                }
                Step::Text(value) => {
                    if let (Some(target), Some(station)) = (self.text_target, self.current.as_mut())
                    {
                        let field = match target {
                            TextField::Address => &mut station.address,
                            TextField::City => &mut station.city,
                        };
                        append_text(field, value);
                    }
                }
                Step::TextEnd => self.text_target = None,
                Step::StationEnd => self.finish_station(),
                Step::Eof => {
                    if self.current.is_some() {
                        return self.fail(ArchiveError::Truncated);
                    }
                    self.finished = true;
                    let remaining = self.pending.records.len();
                    return (remaining > 0).then(|| Ok(self.take_batch(remaining)));
                }
                Step::Failed(source) => {
                    let position = self.reader.buffer_position() as u64;
                    return self.fail(ArchiveError::Xml { position, source });
                }
                Step::Skip => {}
            }
        }
    }
}

impl<R: BufRead> FusedIterator for ArchiveReader<R> {}

fn open_step(e: &BytesStart<'_>, decoder: Decoder, closed: bool) -> Step {
    match e.local_name().as_ref() {
        b"pdv" => Step::Station {
            station: station_from_element(e, decoder),
            closed,
        },
        b"prix" => Step::Price(price_from_element(e, decoder)),
        b"adresse" if !closed => Step::TextStart(TextField::Address),
        b"ville" if !closed => Step::TextStart(TextField::City),
        _ => Step::Skip,
    }
}

fn append_text(field: &mut Option<String>, value: Option<String>) {
    let Some(value) = value else { return };
    match field {
        Some(existing) => {
            existing.push(' ');
            existing.push_str(&value);
        }
        None => *field = Some(value),
    }
}

/// Attribute values of an element; `None` if any attribute is malformed
fn attributes(e: &BytesStart<'_>, decoder: Decoder) -> Option<Vec<(Vec<u8>, String)>> {
    e.attributes()
        .map(|attr| {
            let attr = attr.ok()?;
            let value = attr.decode_and_unescape_value(decoder).ok()?;
            Some((attr.key.local_name().as_ref().to_vec(), value.into_owned()))
        })
        .collect()
}

fn station_from_element(e: &BytesStart<'_>, decoder: Decoder) -> RawArchiveStation {
    let mut station = RawArchiveStation::default();

    // Malformed attributes leave the id empty, so the adapter skips the station
    for (key, value) in attributes(e, decoder).unwrap_or_default() {
        match key.as_slice() {
            b"id" => station.id = Some(value),
            b"latitude" => station.latitude = Some(value),
            b"longitude" => station.longitude = Some(value),
            b"cp" => station.postal_code = Some(value),
            _ => {}
        }
    }

    station
}

fn price_from_element(e: &BytesStart<'_>, decoder: Decoder) -> RawArchivePrice {
    let mut price = RawArchivePrice::default();

    for (key, value) in attributes(e, decoder).unwrap_or_default() {
        match key.as_slice() {
            b"nom" => price.name = Some(value),
            b"valeur" => price.value = Some(value),
            b"maj" => price.updated_at = Some(value),
            _ => {}
        }
    }

    price
}

/// Run an archive reader on the blocking pool, feeding a bounded channel.
///
/// The reader stops early when `cancel` is set or the receiver is dropped.
/// The join handle resolves to the final counters.
pub fn spawn_batches(
    path: PathBuf,
    batch_size: usize,
    cancel: Arc<AtomicBool>,
) -> (
    mpsc::Receiver<Result<Vec<SourceRecord>, ArchiveError>>,
    JoinHandle<ArchiveStats>,
) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let handle = tokio::task::spawn_blocking(move || {
        let mut reader = match ArchiveReader::open(&path, batch_size) {
            Ok(reader) => reader,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return ArchiveStats::default();
            }
        };

        for batch in reader.by_ref() {
            if cancel.load(Ordering::Relaxed) {
                let _ = tx.blocking_send(Err(ArchiveError::Cancelled));
                break;
            }
            if tx.blocking_send(batch).is_err() {
                break;
            }
        }

        reader.stats()
    });

    (rx, handle)
}
