use crate::source::error::Error;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SuiteEntry {
    pub title: String,
    pub parent: Option<u64>,
    /// Marks the runner's own top-level suite, which never shows up in reports.
    pub root: bool,
    pub suites: Vec<u64>,
    pub tests: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct TestEntry {
    pub title: String,
    pub parent: u64,
    pub sync: bool,
    pub duration_ms: Option<u64>,
}

/// The runner's own view of its suites and tests, linked child to parent.
#[derive(Debug, Default)]
pub struct Registry {
    suites: HashMap<u64, SuiteEntry>,
    tests: HashMap<u64, TestEntry>,
    root: Option<u64>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_suite(
        &mut self,
        id: u64,
        parent: Option<u64>,
        title: String,
        root: bool,
    ) -> Result<(), Error> {
        if self.suites.contains_key(&id) {
            return Err(Error::DuplicateSuite(id));
        }
        match (root, self.root, parent) {
            (true, Some(existing), _) => return Err(Error::DuplicateRoot(existing)),
            (false, _, None) => return Err(Error::DetachedSuite(id)),
            _ => {}
        }
        if let Some(parent) = parent {
            self.suites
                .get_mut(&parent)
                .ok_or(Error::UnknownSuite(parent))?
                .suites
                .push(id);
        }
        if root {
            self.root = Some(id);
        }
        self.suites.insert(
            id,
            SuiteEntry {
                title,
                parent,
                root,
                suites: Vec::new(),
                tests: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn declare_test(
        &mut self,
        id: u64,
        parent: u64,
        title: String,
        sync: bool,
    ) -> Result<(), Error> {
        if self.tests.contains_key(&id) {
            return Err(Error::DuplicateTest(id));
        }
        self.suites
            .get_mut(&parent)
            .ok_or(Error::UnknownSuite(parent))?
            .tests
            .push(id);
        self.tests.insert(
            id,
            TestEntry {
                title,
                parent,
                sync,
                duration_ms: None,
            },
        );
        Ok(())
    }

    #[inline]
    pub fn test(&self, id: u64) -> Option<&TestEntry> {
        self.tests.get(&id)
    }

    #[inline]
    pub fn test_mut(&mut self, id: u64) -> Option<&mut TestEntry> {
        self.tests.get_mut(&id)
    }

    /// Titles of the suites containing `test`, outermost first, root excluded.
    pub fn ancestor_titles(&self, test: &TestEntry) -> Vec<&str> {
        let mut titles = Vec::new();
        let mut parent = Some(test.parent);
        while let Some(suite) = parent.and_then(|id| self.suites.get(&id)) {
            if suite.root {
                break;
            }
            titles.push(suite.title.as_str());
            parent = suite.parent;
        }
        titles.reverse();
        titles
    }

    /// Visits every test reachable from the root: nested suites first, then
    /// the suite's own tests. Returns false when there is no root to start from.
    pub fn for_each_test<F>(&self, mut callback: F) -> bool
    where
        F: FnMut(u64, &TestEntry),
    {
        match self.root {
            Some(root) => {
                self.visit(root, &mut callback);
                true
            }
            None => false,
        }
    }

    fn visit<F>(&self, suite: u64, callback: &mut F)
    where
        F: FnMut(u64, &TestEntry),
    {
        let entry = match self.suites.get(&suite) {
            Some(entry) => entry,
            None => return,
        };
        for &child in &entry.suites {
            self.visit(child, callback);
        }
        for &test in &entry.tests {
            if let Some(test_entry) = self.tests.get(&test) {
                callback(test, test_entry);
            }
        }
    }
}
