use crate::error::{ParseError, ParseResult};
use crate::id_generator::IDGenerator;
use crate::tokenizer::{tokenize, Lexeme, TokenKind};
use crate::tree::{AttributeData, ElementData, NodeData, NodeId, RawNode, RawToken, RawTree};

/// Parser for XML-like documents
///
/// Builds a [`RawTree`] whose nodes keep every token of the source. Lexer
/// failures are fatal. Structural problems (unclosed or mismatched tags,
/// stray text, a missing or duplicated document element) are recovered
/// from: the document keeps the whole source as one salvage token node, has
/// no root element, and records the problem in its diagnostics.
pub struct Parser<'src> {
    source: &'src str,
    lexemes: Vec<Lexeme>,
    pos: usize,
    tree: RawTree,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, ids: IDGenerator) -> ParseResult<Self> {
        let lexemes = tokenize(source)?;
        Ok(Self {
            source,
            lexemes,
            pos: 0,
            tree: RawTree::new(ids),
        })
    }

    #[cfg(test)]
    pub fn new_with_path(source: &'src str, path: &str) -> ParseResult<Self> {
        Self::new(source, IDGenerator::new(path))
    }

    /// Parse a complete document
    pub fn parse_document(mut self) -> ParseResult<RawTree> {
        let document = self.tree.document();
        match self.parse_content(document, true) {
            Ok(()) => Ok(self.tree),
            Err(error) if !error.is_fatal() => Ok(self.salvage(error)),
            Err(error) => Err(error),
        }
    }

    /// Parse a content fragment: any sequence of elements, text and markup
    ///
    /// The returned tree's document node holds the fragment's top-level nodes.
    pub fn parse_fragment(mut self) -> ParseResult<RawTree> {
        let document = self.tree.document();
        self.parse_content(document, false)?;
        Ok(self.tree)
    }

    fn salvage(self, error: ParseError) -> RawTree {
        let mut tree = RawTree::new(self.tree.ids.clone());
        if !self.source.is_empty() {
            let document = tree.document();
            let id = tree.ids.new_id();
            let mut salvage = RawNode::new(id, NodeData::Token(vec![RawToken::new(TokenKind::Text, self.source)]));
            salvage.parent = Some(document);
            tree.nodes.insert(id, salvage);
            if let Some(root) = tree.nodes.get_mut(&document) {
                root.children.push(id);
            }
        }
        tree.diagnostics.push(error);
        tree
    }

    fn parse_content(&mut self, container: NodeId, document_level: bool) -> ParseResult<()> {
        let mut open: Vec<(NodeId, usize)> = Vec::new();

        while let Some(lexeme) = self.peek().cloned() {
            let parent = open.last().map(|(id, _)| *id).unwrap_or(container);
            let at_top = document_level && open.is_empty();

            match lexeme.kind {
                TokenKind::Text => {
                    self.advance();
                    let text = lexeme.text(self.source);
                    if at_top && !text.trim().is_empty() {
                        return Err(ParseError::invalid_syntax(
                            lexeme.span.start,
                            "text outside the document element",
                        ));
                    }
                    self.add_node(parent, NodeData::Text(text.to_string()))?;
                }
                TokenKind::CData if at_top => {
                    return Err(ParseError::invalid_syntax(
                        lexeme.span.start,
                        "CDATA outside the document element",
                    ));
                }
                TokenKind::Comment
                | TokenKind::ProcessingInstruction
                | TokenKind::Declaration
                | TokenKind::CData => {
                    self.advance();
                    let token = RawToken::new(lexeme.kind, lexeme.text(self.source));
                    self.add_node(parent, NodeData::Token(vec![token]))?;
                }
                TokenKind::TagOpen => {
                    if at_top && self.tree.root_element().is_some() {
                        return Err(ParseError::invalid_syntax(
                            lexeme.span.start,
                            "document has more than one root element",
                        ));
                    }
                    let (element, empty) = self.parse_start_tag()?;
                    self.link(parent, element)?;
                    if !empty {
                        open.push((element, lexeme.span.start));
                    }
                }
                TokenKind::EndTagOpen => {
                    let (name, tail) = self.parse_end_tag()?;
                    let Some((element, _)) = open.pop() else {
                        return Err(ParseError::invalid_syntax(
                            lexeme.span.start,
                            format!("end tag </{}> without a matching start tag", name),
                        ));
                    };
                    let data = self.element_mut(element)?;
                    if data.name != name {
                        return Err(ParseError::MismatchedTag {
                            pos: lexeme.span.start,
                            expected: data.name.clone(),
                            found: name,
                        });
                    }
                    data.end_tail = tail;
                }
                other => {
                    return Err(ParseError::unexpected_token(
                        lexeme.span.start,
                        "content",
                        describe(other),
                    ));
                }
            }
        }

        if let Some((element, pos)) = open.last() {
            let name = self.tree.element(*element).map(|e| e.name.clone()).unwrap_or_default();
            return Err(ParseError::UnclosedElement { pos: *pos, name });
        }

        if document_level && self.tree.root_element().is_none() {
            return Err(ParseError::invalid_syntax(
                self.source.len(),
                "document has no root element",
            ));
        }

        Ok(())
    }

    /// Parse `<name attr="v" ...>` or `<name .../>`; returns the element and
    /// whether it was self-closing
    fn parse_start_tag(&mut self) -> ParseResult<(NodeId, bool)> {
        self.expect(TokenKind::TagOpen)?;
        let name = self.expect(TokenKind::Name)?.text(self.source).to_string();
        let element = self.tree.insert_node(NodeData::Element(ElementData::new(name)));
        let mut pending_ws = String::new();

        loop {
            let Some(lexeme) = self.advance() else {
                return Err(ParseError::unexpected_eof(self.source.len()));
            };

            match lexeme.kind {
                TokenKind::Whitespace => {
                    pending_ws = lexeme.text(self.source).to_string();
                }
                TokenKind::Name => {
                    if pending_ws.is_empty() {
                        return Err(ParseError::invalid_syntax(
                            lexeme.span.start,
                            "attributes must be separated by whitespace",
                        ));
                    }
                    let attribute = self.parse_attribute(lexeme, std::mem::take(&mut pending_ws))?;
                    if self.tree.attribute_node(element, &attribute.name).is_some() {
                        return Err(ParseError::invalid_syntax(
                            self.current_pos(),
                            format!("duplicate attribute `{}`", attribute.name),
                        ));
                    }
                    self.add_node(element, NodeData::Attribute(attribute))?;
                }
                TokenKind::TagClose | TokenKind::EmptyTagClose => {
                    let empty = lexeme.kind == TokenKind::EmptyTagClose;
                    let data = self.element_mut(element)?;
                    data.tag_tail = pending_ws;
                    data.self_closing = empty;
                    return Ok((element, empty));
                }
                other => {
                    return Err(ParseError::unexpected_token(
                        lexeme.span.start,
                        "attribute or `>`",
                        describe(other),
                    ));
                }
            }
        }
    }

    fn parse_attribute(&mut self, name: Lexeme, leading: String) -> ParseResult<AttributeData> {
        self.skip(TokenKind::Whitespace);
        self.expect(TokenKind::Equals)?;
        self.skip(TokenKind::Whitespace);
        let value = self.expect(TokenKind::Value)?;

        let quoted = value.text(self.source);
        let quote = quoted.chars().next().unwrap_or('"');
        Ok(AttributeData {
            leading,
            name: name.text(self.source).to_string(),
            separator: self.source[name.span.end..value.span.start].to_string(),
            quote,
            raw_value: quoted[1..quoted.len() - 1].to_string(),
        })
    }

    /// Parse `</name>`; returns the name and the whitespace before `>`
    fn parse_end_tag(&mut self) -> ParseResult<(String, String)> {
        self.expect(TokenKind::EndTagOpen)?;
        let name = self.expect(TokenKind::Name)?.text(self.source).to_string();
        let tail = match self.peek() {
            Some(lexeme) if lexeme.kind == TokenKind::Whitespace => {
                let tail = lexeme.text(self.source).to_string();
                self.advance();
                tail
            }
            _ => String::new(),
        };
        self.expect(TokenKind::TagClose)?;
        Ok((name, tail))
    }

    fn add_node(&mut self, parent: NodeId, data: NodeData) -> ParseResult<NodeId> {
        let id = self.tree.insert_node(data);
        self.link(parent, id)?;
        Ok(id)
    }

    fn link(&mut self, parent: NodeId, child: NodeId) -> ParseResult<()> {
        self.tree
            .link_child(parent, child, None)
            .map_err(|e| ParseError::invalid_syntax(self.current_pos(), e.to_string()))
    }

    fn element_mut(&mut self, id: NodeId) -> ParseResult<&mut ElementData> {
        let pos = self.current_pos();
        match self.tree.nodes.get_mut(&id).map(|node| &mut node.data) {
            Some(NodeData::Element(element)) => Ok(element),
            _ => Err(ParseError::invalid_syntax(pos, "expected an element")),
        }
    }

    // ----- token helpers -----

    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn advance(&mut self) -> Option<Lexeme> {
        let lexeme = self.lexemes.get(self.pos).cloned();
        self.pos += 1;
        lexeme
    }

    fn skip(&mut self, kind: TokenKind) {
        if self.peek().map_or(false, |lexeme| lexeme.kind == kind) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Lexeme> {
        match self.peek() {
            Some(lexeme) if lexeme.kind == kind => {
                let lexeme = lexeme.clone();
                self.pos += 1;
                Ok(lexeme)
            }
            Some(lexeme) => Err(ParseError::unexpected_token(
                lexeme.span.start,
                describe(kind),
                describe(lexeme.kind),
            )),
            None => Err(ParseError::unexpected_eof(self.source.len())),
        }
    }

    fn current_pos(&self) -> usize {
        self.lexemes
            .get(self.pos.saturating_sub(1))
            .map(|lexeme| lexeme.span.start)
            .unwrap_or(0)
    }
}

fn describe(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Comment => "comment",
        TokenKind::CData => "CDATA section",
        TokenKind::ProcessingInstruction => "processing instruction",
        TokenKind::Declaration => "declaration",
        TokenKind::EndTagOpen => "`</`",
        TokenKind::TagOpen => "`<`",
        TokenKind::Text => "text",
        TokenKind::Name => "name",
        TokenKind::Equals => "`=`",
        TokenKind::Value => "quoted value",
        TokenKind::Whitespace => "whitespace",
        TokenKind::TagClose => "`>`",
        TokenKind::EmptyTagClose => "`/>`",
    }
}

/// Parse a document with a throwaway id lineage
pub fn parse(source: &str) -> ParseResult<RawTree> {
    parse_with_ids(source, IDGenerator::default())
}

/// Parse a document whose ids are seeded from its path
pub fn parse_with_path(source: &str, path: &str) -> ParseResult<RawTree> {
    parse_with_ids(source, IDGenerator::new(path))
}

/// Parse a document drawing ids from an existing lineage
pub fn parse_with_ids(source: &str, ids: IDGenerator) -> ParseResult<RawTree> {
    Parser::new(source, ids)?.parse_document()
}

/// Parse a content fragment drawing ids from an existing lineage
pub fn parse_fragment(source: &str, ids: IDGenerator) -> ParseResult<RawTree> {
    Parser::new(source, ids)?.parse_fragment()
}
