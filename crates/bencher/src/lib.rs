#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    file: TestFile,
    depth: usize,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, file: TestFile, depth: usize) -> Self {
        Self { name, group, file, depth }
    }

    /// a chain where the first middleware answers
    pub fn shallow(name: &'static str, file: TestFile) -> Self {
        Self::new(name, TestGroup::Shallow, file, 0)
    }

    /// a chain where `depth` middleware pass before one answers
    pub fn deep(name: &'static str, file: TestFile, depth: usize) -> Self {
        Self::new(name, TestGroup::Deep, file, depth)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// A request body fixture.
#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, content: &'static str) -> Self {
        Self { file_name, content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Shallow,
    Deep,
}

impl TestGroup {
    /// criterion group name
    pub fn name(&self) -> &'static str {
        match self {
            TestGroup::Shallow => "shallow_chain",
            TestGroup::Deep => "deep_chain",
        }
    }
}
