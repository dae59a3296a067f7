//! Binding raw result documents into caller-supplied containers.
//!
//! The caller picks the container shape through [`Destination`]; binding
//! itself only sees an indexed sink that may or may not grow.

use crate::{codec, error::Result, model::Model, naming, response::Hit};
use tracing::debug;

/// A container receiving bound records.
///
/// Pointer variants hold `Option<Box<M>>` slots: an empty slot receives a
/// freshly allocated default record, an occupied one is decoded in place.
#[derive(Debug)]
pub enum Destination<'a, M> {
    /// A single record.
    Value(&'a mut M),
    /// A single, possibly unallocated, record.
    Pointer(&'a mut Option<Box<M>>),
    /// A fixed number of records.
    Array(&'a mut [M]),
    /// A fixed number of possibly unallocated records.
    PointerArray(&'a mut [Option<Box<M>>]),
    /// A list grown as hits arrive.
    List(&'a mut Vec<M>),
    /// A list of possibly unallocated records grown as hits arrive.
    PointerList(&'a mut Vec<Option<Box<M>>>),
}

/// Shape of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One record.
    Single,
    /// A fixed number of records.
    Fixed(usize),
    /// Any number of records.
    Growable,
}

impl<'a, M> Destination<'a, M> {
    /// Bind into a single record.
    pub fn value(record: &'a mut M) -> Self {
        Destination::Value(record)
    }

    /// Bind into a single optional boxed record.
    pub fn pointer(record: &'a mut Option<Box<M>>) -> Self {
        Destination::Pointer(record)
    }

    /// Bind into a fixed-size array of records.
    pub fn array<const N: usize>(records: &'a mut [M; N]) -> Self {
        Destination::Array(records.as_mut_slice())
    }

    /// Bind into a fixed-size array of optional boxed records.
    pub fn pointer_array<const N: usize>(records: &'a mut [Option<Box<M>>; N]) -> Self {
        Destination::PointerArray(records.as_mut_slice())
    }

    /// Bind into a growable list of records.
    pub fn list(records: &'a mut Vec<M>) -> Self {
        Destination::List(records)
    }

    /// Bind into a growable list of optional boxed records.
    pub fn pointer_list(records: &'a mut Vec<Option<Box<M>>>) -> Self {
        Destination::PointerList(records)
    }

    /// Shape of this destination.
    pub fn shape(&self) -> Shape {
        match self {
            Destination::Value(_) | Destination::Pointer(_) => Shape::Single,
            Destination::Array(records) => Shape::Fixed(records.len()),
            Destination::PointerArray(records) => Shape::Fixed(records.len()),
            Destination::List(_) | Destination::PointerList(_) => Shape::Growable,
        }
    }

    /// Largest number of hits this destination can hold, if bounded.
    pub fn capacity(&self) -> Option<usize> {
        match self.shape() {
            Shape::Single => Some(1),
            Shape::Fixed(len) => Some(len),
            Shape::Growable => None,
        }
    }
}

impl<'a, M> From<&'a mut Vec<M>> for Destination<'a, M> {
    fn from(records: &'a mut Vec<M>) -> Self {
        Destination::List(records)
    }
}

impl<'a, M, const N: usize> From<&'a mut [M; N]> for Destination<'a, M> {
    fn from(records: &'a mut [M; N]) -> Self {
        Destination::Array(records.as_mut_slice())
    }
}

/// A raw document as returned by the store.
#[derive(Debug, Clone, Copy)]
pub struct RawDocument<'a> {
    /// Document id, when the response carries one.
    pub id: Option<&'a str>,
    /// Raw body.
    pub body: &'a [u8],
}

impl<'a> RawDocument<'a> {
    /// A document without an id.
    pub fn new(body: &'a [u8]) -> Self {
        Self { id: None, body }
    }

    /// Attach an id.
    pub fn with_id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }
}

impl<'a> From<&'a Hit> for RawDocument<'a> {
    fn from(hit: &'a Hit) -> Self {
        Self {
            id: hit.id.as_deref(),
            body: hit.source_bytes(),
        }
    }
}

/// Bind documents, in order, into a destination.
///
/// - A single record receives the first document, if any.
/// - A fixed array receives the first `len` documents; later ones are
///   dropped and slots without a document keep their value.
/// - A list grows one element at a time as documents arrive. It is not
///   cleared first: existing elements are decoded in place.
///
/// When the record type declares [`Model::AUTOMATIC_ID`], each document's id
/// is written back after decoding.
///
/// A decoding failure stops binding. Records bound before the failure keep
/// their new values.
///
/// Returns the number of records bound.
pub fn bind<'h, M, I>(documents: I, destination: Destination<'_, M>) -> Result<usize>
where
    M: Model + Default,
    I: IntoIterator<Item = RawDocument<'h>>,
{
    let shape = destination.shape();
    let bound = match destination {
        Destination::Value(record) => fill(&mut Values(std::slice::from_mut(record)), documents),
        Destination::Pointer(record) => {
            fill(&mut Pointers(std::slice::from_mut(record)), documents)
        }
        Destination::Array(records) => fill(&mut Values(records), documents),
        Destination::PointerArray(records) => fill(&mut Pointers(records), documents),
        Destination::List(records) => fill(&mut ValueList(records), documents),
        Destination::PointerList(records) => fill(&mut PointerList(records), documents),
    }?;

    debug!("Bound {} documents into {:?} destination", bound, shape);
    Ok(bound)
}

trait Sink {
    type Record;

    fn len(&self) -> usize;

    /// Append an empty slot. Returns false for fixed-size sinks.
    fn grow(&mut self) -> bool;

    /// The record at `index`, allocating it if the slot is empty.
    fn record(&mut self, index: usize) -> &mut Self::Record;
}

struct Values<'a, M>(&'a mut [M]);

struct Pointers<'a, M>(&'a mut [Option<Box<M>>]);

struct ValueList<'a, M>(&'a mut Vec<M>);

struct PointerList<'a, M>(&'a mut Vec<Option<Box<M>>>);

impl<M> Sink for Values<'_, M> {
    type Record = M;

    fn len(&self) -> usize {
        self.0.len()
    }

    fn grow(&mut self) -> bool {
        false
    }

    fn record(&mut self, index: usize) -> &mut M {
        &mut self.0[index]
    }
}

impl<M: Default> Sink for Pointers<'_, M> {
    type Record = M;

    fn len(&self) -> usize {
        self.0.len()
    }

    fn grow(&mut self) -> bool {
        false
    }

    fn record(&mut self, index: usize) -> &mut M {
        self.0[index].get_or_insert_with(Box::default)
    }
}

impl<M: Default> Sink for ValueList<'_, M> {
    type Record = M;

    fn len(&self) -> usize {
        self.0.len()
    }

    fn grow(&mut self) -> bool {
        self.0.push(M::default());
        true
    }

    fn record(&mut self, index: usize) -> &mut M {
        &mut self.0[index]
    }
}

impl<M: Default> Sink for PointerList<'_, M> {
    type Record = M;

    fn len(&self) -> usize {
        self.0.len()
    }

    fn grow(&mut self) -> bool {
        self.0.push(None);
        true
    }

    fn record(&mut self, index: usize) -> &mut M {
        self.0[index].get_or_insert_with(Box::default)
    }
}

fn fill<'h, S, I>(sink: &mut S, documents: I) -> Result<usize>
where
    S: Sink,
    S::Record: Model,
    I: IntoIterator<Item = RawDocument<'h>>,
{
    let mut bound = 0;
    for (index, document) in documents.into_iter().enumerate() {
        if index >= sink.len() && !sink.grow() {
            break;
        }

        let record = sink.record(index);
        codec::parse_document(Some(&mut *record), document.body)?;
        if let Some(id) = document.id {
            naming::set_document_id(record, id)?;
        }
        bound += 1;
    }
    Ok(bound)
}
