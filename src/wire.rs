//! Line protocol spoken with the skeleton worker.
//!
//! Request (worker stdin): one line per polygon, `x0 y0 x1 y1 ...`.
//!
//! Response (worker stdout), a trivial-graph-format variant:
//! ```text
//! 0 1.5,2,0.5,1
//! 1 3,2,-0.25
//! #
//! 0 1
//! ```
//! Node lines are `id x,y,radius[,...]`; values past the third are ignored so
//! both the 3- and 4-wide worker labels decode. A single `#` line separates
//! nodes from `id1 id2` edge lines, which run to end of stream.
//!
//! The same shape is used to persist a [`SkeletonGraph`] to disk.

use crate::geometry::Polygon;
use crate::graph::{NodeId, SkeletonGraph};
use std::io::{BufRead, Write};

const SENTINEL: &str = "#";

/// What a response line got wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Node line without a label field.
    MissingLabel,
    /// Line with an unexpected number of whitespace-separated fields.
    FieldCount { expected: usize, found: usize },
    /// Label with fewer than three comma-separated values.
    ShortLabel { found: usize },
    /// Field that does not parse as the expected number type.
    BadNumber { field: String, expected: &'static str },
    /// Edge naming an id absent from the node section.
    UnknownNode { id: NodeId },
    /// Stream ended before the `#` separator.
    MissingSentinel,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::MissingLabel => write!(f, "node line has no `x,y,radius` label"),
            Violation::FieldCount { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            }
            Violation::ShortLabel { found } => {
                write!(f, "label needs at least 3 comma-separated values, found {found}")
            }
            Violation::BadNumber { field, expected } => {
                write!(f, "`{field}` is not a valid {expected}")
            }
            Violation::UnknownNode { id } => {
                write!(f, "edge references undeclared node {id}")
            }
            Violation::MissingSentinel => {
                write!(f, "end of stream before `{SENTINEL}` separator line")
            }
        }
    }
}

/// A response line that violates the wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolError {
    /// 1-based line number; for [`Violation::MissingSentinel`] this is one
    /// past the last line.
    pub line_number: usize,
    /// The offending line, empty when the stream ended early.
    pub line: String,
    pub violation: Violation,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.violation)?;
        if !self.line.is_empty() {
            write!(f, " (in {:?})", self.line)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

/// Errors persisting or loading a graph file.
#[derive(Debug)]
pub enum GraphIoError {
    Io(std::io::Error),
    Protocol(ProtocolError),
}

impl std::fmt::Display for GraphIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphIoError::Io(e) => write!(f, "I/O error: {e}"),
            GraphIoError::Protocol(e) => write!(f, "malformed graph: {e}"),
        }
    }
}

impl std::error::Error for GraphIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GraphIoError::Io(e) => Some(e),
            GraphIoError::Protocol(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for GraphIoError {
    fn from(e: std::io::Error) -> Self {
        GraphIoError::Io(e)
    }
}

impl From<ProtocolError> for GraphIoError {
    fn from(e: ProtocolError) -> Self {
        GraphIoError::Protocol(e)
    }
}

/// Build the worker request: one `x0 y0 x1 y1 ...` line per polygon.
///
/// An empty polygon yields an empty line.
pub fn encode_polygons(polygons: &[Polygon]) -> Vec<String> {
    polygons
        .iter()
        .map(|points| {
            points
                .iter()
                .flat_map(|&(x, y)| [x, y])
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Parse worker stdout into a skeleton graph.
///
/// Fails on the first malformed line; never returns a partial graph.
pub fn decode_skeleton<I, S>(lines: I) -> Result<SkeletonGraph, ProtocolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut graph = SkeletonGraph::new();
    let mut lines = lines.into_iter().enumerate();
    let mut line_count = 0;

    let mut found_sentinel = false;
    for (idx, line) in lines.by_ref() {
        line_count = idx + 1;
        let line = line.as_ref();
        if line.trim() == SENTINEL {
            found_sentinel = true;
            break;
        }
        let fail = |violation| ProtocolError {
            line_number: idx + 1,
            line: line.to_string(),
            violation,
        };
        let (id, position, radius) = parse_node_line(line).map_err(fail)?;
        graph.add_node(id, position, radius);
    }
    if !found_sentinel {
        return Err(ProtocolError {
            line_number: line_count + 1,
            line: String::new(),
            violation: Violation::MissingSentinel,
        });
    }

    for (idx, line) in lines {
        let line = line.as_ref();
        let fail = |violation| ProtocolError {
            line_number: idx + 1,
            line: line.to_string(),
            violation,
        };
        let (a, b) = parse_edge_line(line).map_err(fail)?;
        graph
            .add_edge(a, b)
            .map_err(|id| fail(Violation::UnknownNode { id }))?;
    }

    Ok(graph)
}

fn parse_node_line(line: &str) -> Result<(NodeId, (f64, f64), f64), Violation> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.len() {
        2 => {}
        1 => return Err(Violation::MissingLabel),
        found => return Err(Violation::FieldCount { expected: 2, found }),
    }
    let id = parse_id(fields[0])?;

    let values: Vec<&str> = fields[1].split(',').collect();
    if values.len() < 3 {
        return Err(Violation::ShortLabel {
            found: values.len(),
        });
    }
    let x = parse_float(values[0])?;
    let y = parse_float(values[1])?;
    let radius = parse_float(values[2])?;
    Ok((id, (x, y), radius))
}

fn parse_edge_line(line: &str) -> Result<(NodeId, NodeId), Violation> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(Violation::FieldCount {
            expected: 2,
            found: fields.len(),
        });
    }
    Ok((parse_id(fields[0])?, parse_id(fields[1])?))
}

fn parse_id(field: &str) -> Result<NodeId, Violation> {
    field.parse().map_err(|_| Violation::BadNumber {
        field: field.to_string(),
        expected: "integer node id",
    })
}

fn parse_float(field: &str) -> Result<f64, Violation> {
    field.parse().map_err(|_| Violation::BadNumber {
        field: field.to_string(),
        expected: "number",
    })
}

/// Serialize a graph in the response format.
///
/// Numbers use the shortest representation that parses back to the same
/// `f64`, so [`decode_graph`] reproduces the graph exactly.
pub fn encode_graph(graph: &SkeletonGraph) -> Vec<String> {
    let mut lines = Vec::with_capacity(graph.node_count() + graph.edge_count() + 1);
    for node in graph.nodes() {
        let (x, y) = node.position;
        lines.push(format!("{} {},{},{}", node.id, x, y, node.radius));
    }
    lines.push(SENTINEL.to_string());
    for &(a, b) in graph.edges() {
        lines.push(format!("{a} {b}"));
    }
    lines
}

/// Inverse of [`encode_graph`]. Same rules as [`decode_skeleton`].
pub fn decode_graph<I, S>(lines: I) -> Result<SkeletonGraph, ProtocolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    decode_skeleton(lines)
}

/// Write a graph to `out`, one line per record.
pub fn write_graph<W: Write>(graph: &SkeletonGraph, mut out: W) -> std::io::Result<()> {
    for line in encode_graph(graph) {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Read a graph previously written by [`write_graph`].
pub fn read_graph<R: BufRead>(reader: R) -> Result<SkeletonGraph, GraphIoError> {
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
    Ok(decode_graph(&lines)?)
}
