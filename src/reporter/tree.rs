use crate::reporter::error::Error;
use crate::reporter::message::{close_message, open_message};
use derivative::*;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

pub type NodeId = usize;

/// Id of the hidden root. It is never opened nor closed.
pub const ROOT_ID: NodeId = 0;

const ROOT_NAME: &str = "hidden root";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Suite,
    Test,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Suite => "suite",
            NodeKind::Test => "test",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Passed,
    Skipped,
    Failed,
    /// A failure that did not come from an assertion, e.g. an uncaught error.
    Errored,
}

#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct TestOutcome {
    pub status: TestStatus,
    #[builder(default)]
    pub duration_ms: Option<u64>,
    #[builder(default)]
    pub message: Option<String>,
    /// Stack trace or any other multi-line detail.
    #[builder(default)]
    pub details: Option<String>,
    #[builder(default)]
    pub actual: Option<String>,
    #[builder(default)]
    pub expected: Option<String>,
}

impl TestOutcome {
    pub fn builder() -> TestOutcomeBuilder {
        TestOutcomeBuilder::default()
    }
}

impl TestOutcomeBuilder {
    fn validate(&self) -> Result<(), String> {
        let actual = self.actual.as_ref().map_or(false, Option::is_some);
        let expected = self.expected.as_ref().map_or(false, Option::is_some);
        if actual != expected {
            return Err("actual and expected values must be reported together".to_owned());
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum NodeBody {
    Suite {
        children: Vec<NodeId>,
        /// Latest child suite per name.
        suites: HashMap<String, NodeId>,
        /// Latest child test per name.
        tests: HashMap<String, NodeId>,
    },
    Test {
        outcome: Option<TestOutcome>,
    },
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    parent: Option<NodeId>,
    name: String,
    kind: Option<NodeKind>,
    location_path: Option<String>,
    finished: bool,
    body: NodeBody,
}

impl Node {
    fn new(
        id: NodeId,
        parent: Option<NodeId>,
        name: String,
        is_suite: bool,
        kind: Option<NodeKind>,
        location_path: Option<String>,
    ) -> Self {
        let body = if is_suite {
            NodeBody::Suite {
                children: Vec::new(),
                suites: HashMap::new(),
                tests: HashMap::new(),
            }
        } else {
            NodeBody::Test { outcome: None }
        };
        Self {
            id,
            parent,
            name,
            kind,
            location_path,
            finished: false,
            body,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Parent id as it goes on the wire: direct children of the root report 0.
    #[inline]
    pub fn parent_id(&self) -> NodeId {
        self.parent.unwrap_or(ROOT_ID)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> Option<NodeKind> {
        self.kind
    }

    #[inline]
    pub fn location_path(&self) -> Option<&str> {
        self.location_path.as_deref()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub fn is_suite(&self) -> bool {
        matches!(self.body, NodeBody::Suite { .. })
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub fn children(&self) -> &[NodeId] {
        match self.body {
            NodeBody::Suite { ref children, .. } => children,
            NodeBody::Test { .. } => &[],
        }
    }

    pub fn outcome(&self) -> Option<&TestOutcome> {
        match self.body {
            NodeBody::Test { ref outcome } => outcome.as_ref(),
            NodeBody::Suite { .. } => None,
        }
    }
}

/// Report tree of one run: node arena, id allocation and the output sink.
///
/// Node ids are arena indexes, so they grow in creation order and the root
/// always holds 0.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    #[derivative(Debug = "ignore")]
    out: Box<dyn Write + Send>,
    flush_each_line: bool,
}

impl Tree {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            out,
            flush_each_line: true,
        };
        tree.reset();
        tree
    }

    pub fn with_line_flush(mut self, flush_each_line: bool) -> Self {
        self.flush_each_line = flush_each_line;
        self
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    #[inline]
    pub fn root(&self) -> &Node {
        &self.nodes[ROOT_ID]
    }

    #[inline]
    pub fn next_id(&self) -> NodeId {
        self.nodes.len()
    }

    pub fn create_child(
        &mut self,
        parent: NodeId,
        name: &str,
        is_suite: bool,
        kind: NodeKind,
        location_path: Option<String>,
    ) -> Result<NodeId, Error> {
        let child_id = self.next_id();
        let parent_node = &mut self.nodes[parent];
        if parent_node.finished {
            return Err(Error::SuiteFinished(parent));
        }
        match parent_node.body {
            NodeBody::Suite {
                ref mut children,
                ref mut suites,
                ref mut tests,
            } => {
                children.push(child_id);
                let lookup = if is_suite { suites } else { tests };
                lookup.insert(name.to_owned(), child_id);
            }
            NodeBody::Test { .. } => return Err(Error::NotASuite(parent)),
        }
        let parent_ref = if parent == ROOT_ID { None } else { Some(parent) };
        self.nodes.push(Node::new(
            child_id,
            parent_ref,
            name.to_owned(),
            is_suite,
            Some(kind),
            location_path,
        ));
        Ok(child_id)
    }

    pub fn find_suite(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        match self.nodes[parent].body {
            NodeBody::Suite { ref suites, .. } => suites.get(name).copied(),
            NodeBody::Test { .. } => None,
        }
    }

    pub fn find_test(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        match self.nodes[parent].body {
            NodeBody::Suite { ref tests, .. } => tests.get(name).copied(),
            NodeBody::Test { .. } => None,
        }
    }

    pub fn set_outcome(&mut self, id: NodeId, outcome: TestOutcome) -> Result<(), Error> {
        match self.nodes[id].body {
            NodeBody::Test {
                outcome: ref mut slot,
            } => {
                *slot = Some(outcome);
                Ok(())
            }
            NodeBody::Suite { .. } => Err(Error::Outcome(format!("node {} is a suite", id))),
        }
    }

    pub fn write_line(&mut self, line: &str) -> Result<(), Error> {
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        if self.flush_each_line {
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn write_open(&mut self, id: NodeId) -> Result<(), Error> {
        let text = open_message(self.node(id)).to_string();
        self.write_line(&text)
    }

    /// Emits the close message of a single node and marks it finished.
    pub fn write_close(&mut self, id: NodeId) -> Result<(), Error> {
        let node = self.node(id);
        if node.finished {
            return Err(Error::AlreadyFinished(id));
        }
        let text = close_message(node)?.to_string();
        self.write_line(&text)?;
        self.nodes[id].finished = true;
        Ok(())
    }

    /// Closes every unfinished descendant of `id` child-first, then `id`.
    ///
    /// A failing child does not stop its siblings from closing, but keeps
    /// `id` open. The first fault is returned.
    pub fn close_subtree(&mut self, id: NodeId) -> Result<(), Error> {
        if self.nodes[id].is_finished() {
            return Ok(());
        }
        let mut first_error = None;
        for child in self.nodes[id].children().to_vec() {
            if let Err(err) = self.close_subtree(child) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => self.write_close(id),
        }
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.out.flush().map_err(Error::from)
    }

    /// Drops every node but a fresh root, keeping the sink for the next run.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.nodes
            .push(Node::new(ROOT_ID, None, ROOT_NAME.to_owned(), true, None, None));
    }
}
