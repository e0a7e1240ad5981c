//! Recursive descent scanner for type declarations.
//!
//! The scanner understands package headers, imports, annotations and the head of type
//! declarations (name, supertypes, body). Everything inside a body that is not itself a type
//! declaration is skipped with bracket balancing, so arbitrary member code is tolerated.

use std::ops::Range;

use codespan::Span;

use crate::{
    ast::{
        Annotation, AnnotationArg, AnnotationValue, DeclKeyword, Import, SourceFile, TypeDecl,
        TypeName,
    },
    diagnostics::{Diagnostic, DiagnosticKind},
    lexer::{tokenize, SpannedToken, Token},
    model::{FileId, Loc},
};

const MODIFIERS: &[&str] = &[
    "public",
    "internal",
    "protected",
    "private",
    "abstract",
    "open",
    "final",
    "sealed",
    "data",
    "enum",
    "annotation",
    "inner",
    "companion",
    "value",
    "inline",
    "expect",
    "actual",
    "external",
    "override",
    "lateinit",
    "const",
    "suspend",
    "operator",
    "infix",
    "tailrec",
];

/// Parses one source file. Problems are returned as diagnostics; the parser always recovers
/// and returns whatever declarations it could make sense of.
pub fn parse_file(file_id: FileId, source: &str) -> (SourceFile, Vec<Diagnostic>) {
    let (tokens, invalid) = tokenize(source);
    let mut parser = Parser {
        file_id,
        source,
        tokens: &tokens,
        pos: 0,
        diags: vec![],
    };
    for range in invalid {
        let text = source[range.clone()].to_string();
        let loc = parser.loc_of(range);
        parser.error(loc, format!("unexpected character `{}`", text));
    }
    let file = parser.parse_source_file();
    (file, parser.diags)
}

struct Parser<'src> {
    file_id: FileId,
    source: &'src str,
    tokens: &'src [SpannedToken],
    pos: usize,
    diags: Vec<Diagnostic>,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<Token> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).map(|t| t.token)
    }

    fn peek_text(&self) -> Option<&'src str> {
        let source = self.source;
        self.tokens
            .get(self.pos)
            .map(move |t| &source[t.range.clone()])
    }

    fn advance(&mut self) -> Option<&'src SpannedToken> {
        let tokens = self.tokens;
        let token = tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat(&mut self, expected: Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn loc_of(&self, range: Range<usize>) -> Loc {
        Loc::new(
            self.file_id,
            Span::new(range.start as u32, range.end as u32),
        )
    }

    fn current_loc(&self) -> Loc {
        match self.tokens.get(self.pos) {
            Some(token) => self.loc_of(token.range.clone()),
            None => self.loc_of(self.source.len()..self.source.len()),
        }
    }

    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.range.end)
            .unwrap_or(0)
    }

    fn error(&mut self, loc: Loc, message: impl Into<String>) {
        self.diags
            .push(Diagnostic::new(DiagnosticKind::SyntaxError, loc, message));
    }

    fn parse_source_file(&mut self) -> SourceFile {
        // File-level annotations such as `@file:JvmName("x")`.
        while self.check(Token::At)
            && self.peek_nth(1) == Some(Token::Ident)
            && self.peek_nth(2) == Some(Token::Colon)
            && self.tokens.get(self.pos + 1).map(|t| &self.source[t.range.clone()]) == Some("file")
        {
            let mut ignored = vec![];
            self.parse_annotation(&mut ignored);
        }

        let mut package = vec![];
        if self.eat(Token::Package) {
            match self.qualified_name() {
                Some((path, _)) => package = path,
                None => {
                    let loc = self.current_loc();
                    self.error(loc, "expected a package name");
                }
            }
            self.eat(Token::Semicolon);
        }

        let mut imports = vec![];
        while self.eat(Token::Import) {
            if let Some(import) = self.parse_import() {
                imports.push(import);
            }
            self.eat(Token::Semicolon);
        }

        let declarations = self.parse_members(false);
        SourceFile {
            file_id: self.file_id,
            package,
            imports,
            declarations,
        }
    }

    fn parse_import(&mut self) -> Option<Import> {
        let Some((mut path, _)) = self.qualified_name() else {
            let loc = self.current_loc();
            self.error(loc, "expected an import path");
            return None;
        };
        let mut is_star = false;
        if self.check(Token::Dot) && self.peek_nth(1) == Some(Token::Symbol) {
            self.pos += 2;
            is_star = true;
        }
        let mut alias = None;
        if self.eat(Token::As) {
            match self.identifier() {
                Some((name, _)) => alias = Some(name),
                None => {
                    let loc = self.current_loc();
                    self.error(loc, "expected an import alias");
                }
            }
        }
        if path.is_empty() {
            path.push(String::new());
        }
        Some(Import {
            path,
            alias,
            is_star,
        })
    }

    /// Parses declarations until the end of input or, inside a body, the closing brace.
    fn parse_members(&mut self, in_body: bool) -> Vec<TypeDecl> {
        let mut members = vec![];
        loop {
            match self.peek() {
                None => {
                    if in_body {
                        let loc = self.current_loc();
                        self.error(loc, "expected `}` to close the declaration body");
                    }
                    break;
                }
                Some(Token::RBrace) => {
                    let loc = self.current_loc();
                    self.pos += 1;
                    if in_body {
                        break;
                    }
                    self.error(loc, "unexpected `}`");
                    continue;
                }
                _ => {}
            }

            let start = self.pos;
            let mut annotations = vec![];
            let modifiers = self.parse_modifiers(&mut annotations);
            if self.check(Token::Fun) && self.peek_nth(1) == Some(Token::Interface) {
                self.pos += 1;
            }
            match self.peek() {
                Some(Token::Object)
                    if !matches!(self.peek_nth(1), Some(Token::Ident | Token::QuotedIdent))
                        && !modifiers.iter().any(|m| m == "companion") =>
                {
                    // An object expression, not a declaration.
                    self.pos += 1;
                }
                Some(Token::Interface | Token::Class | Token::Object) => {
                    if let Some(decl) = self.parse_declaration(annotations, modifiers) {
                        members.push(decl);
                    }
                }
                _ => {
                    if self.pos == start {
                        self.skip_token_or_group();
                    }
                }
            }
        }
        members
    }

    fn parse_declaration(
        &mut self,
        annotations: Vec<Annotation>,
        modifiers: Vec<String>,
    ) -> Option<TypeDecl> {
        let keyword_token = self.advance()?;
        let keyword = match keyword_token.token {
            Token::Interface => DeclKeyword::Interface,
            Token::Class => DeclKeyword::Class,
            Token::Object => DeclKeyword::Object,
            _ => return None,
        };
        let (name, loc) = match self.identifier() {
            Some((name, range)) => (name, self.loc_of(range)),
            None if keyword == DeclKeyword::Object => (
                "Companion".to_string(),
                self.loc_of(keyword_token.range.clone()),
            ),
            None => {
                let loc = self.current_loc();
                let keyword_text = &self.source[keyword_token.range.clone()];
                self.error(loc, format!("expected a name after `{}`", keyword_text));
                return None;
            }
        };

        if self.check(Token::Lt) {
            self.skip_angle_group();
        }
        self.parse_primary_constructor();

        let mut supertypes = vec![];
        if self.eat(Token::Colon) {
            supertypes = self.parse_supertypes();
        }
        self.skip_where_clause();

        let members = if self.eat(Token::LBrace) {
            self.parse_members(true)
        } else {
            vec![]
        };

        Some(TypeDecl {
            name,
            loc,
            keyword,
            modifiers,
            annotations,
            supertypes,
            members,
        })
    }

    fn parse_primary_constructor(&mut self) {
        let saved = (self.pos, self.diags.len());
        let mut annotations = vec![];
        self.parse_modifiers(&mut annotations);
        if !self.eat(Token::Constructor) {
            // Those belonged to whatever follows the declaration.
            self.pos = saved.0;
            self.diags.truncate(saved.1);
        }
        if self.check(Token::LParen) {
            self.skip_group();
        }
    }

    fn parse_supertypes(&mut self) -> Vec<TypeName> {
        let mut supertypes = vec![];
        loop {
            let mut ignored = vec![];
            while self.check(Token::At) {
                self.parse_annotation(&mut ignored);
            }
            match self.qualified_name() {
                Some((path, range)) => supertypes.push(TypeName {
                    path,
                    loc: self.loc_of(range),
                }),
                None => {
                    let loc = self.current_loc();
                    self.error(loc, "expected a supertype");
                    break;
                }
            }
            if self.check(Token::Lt) {
                self.skip_angle_group();
            }
            if self.check(Token::LParen) {
                self.skip_group();
            }
            if self.peek() == Some(Token::Ident) && self.peek_text() == Some("by") {
                self.pos += 1;
                self.qualified_name();
                if self.check(Token::LParen) {
                    self.skip_group();
                }
            }
            if !self.eat(Token::Comma) {
                break;
            }
        }
        supertypes
    }

    fn skip_where_clause(&mut self) {
        if !(self.peek() == Some(Token::Ident) && self.peek_text() == Some("where")) {
            return;
        }
        self.pos += 1;
        loop {
            if self.identifier().is_none() || !self.eat(Token::Colon) {
                break;
            }
            self.qualified_name();
            if self.check(Token::Lt) {
                self.skip_angle_group();
            }
            if !self.eat(Token::Comma) {
                break;
            }
        }
    }

    /// Parses modifiers, collecting any annotations interleaved with them.
    fn parse_modifiers(&mut self, annotations: &mut Vec<Annotation>) -> Vec<String> {
        let mut modifiers = vec![];
        loop {
            match self.peek() {
                Some(Token::At) => self.parse_annotation(annotations),
                Some(Token::Ident) => match self.peek_text() {
                    Some(text) if MODIFIERS.contains(&text) => {
                        modifiers.push(text.to_string());
                        self.pos += 1;
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        modifiers
    }

    /// Parses one annotation starting at `@`.
    fn parse_annotation(&mut self, annotations: &mut Vec<Annotation>) {
        let Some(at) = self.advance() else {
            return;
        };
        // Use-site targets such as `@field:Inject`.
        if self.peek() == Some(Token::Ident) && self.peek_nth(1) == Some(Token::Colon) {
            self.pos += 2;
        }
        if self.check(Token::LBracket) {
            self.skip_group();
            return;
        }
        let Some((path, range)) = self.qualified_name() else {
            let loc = self.current_loc();
            self.error(loc, "expected an annotation name");
            return;
        };
        let loc = self.loc_of(at.range.start..range.end);
        let args = if self.check(Token::LParen) {
            self.parse_annotation_args()
        } else {
            vec![]
        };
        annotations.push(Annotation { path, loc, args });
    }

    fn parse_annotation_args(&mut self) -> Vec<AnnotationArg> {
        self.pos += 1;
        let mut args = vec![];
        loop {
            match self.peek() {
                None => {
                    let loc = self.current_loc();
                    self.error(loc, "expected `)` to close the annotation arguments");
                    break;
                }
                Some(Token::RParen) => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }
            let start = self.current_loc().byte_range().start;
            let name = if self.peek() == Some(Token::Ident) && self.peek_nth(1) == Some(Token::Eq) {
                let name = self.peek_text().map(str::to_string);
                self.pos += 2;
                name
            } else {
                None
            };
            let value = self.parse_annotation_value(&[Token::Comma, Token::RParen]);
            let end = self.previous_end().max(start);
            args.push(AnnotationArg {
                name,
                value,
                loc: self.loc_of(start..end),
            });
            if !self.eat(Token::Comma) && !self.check(Token::RParen) {
                let loc = self.current_loc();
                self.error(loc, "unexpected token in annotation arguments");
                break;
            }
        }
        args
    }

    fn parse_annotation_value(&mut self, terminators: &[Token]) -> AnnotationValue {
        match self.peek() {
            Some(Token::LBracket) => {
                self.pos += 1;
                AnnotationValue::Array(self.parse_value_list(Token::RBracket))
            }
            Some(Token::Ident)
                if self.peek_text() == Some("arrayOf") && self.peek_nth(1) == Some(Token::LParen) =>
            {
                self.pos += 2;
                AnnotationValue::Array(self.parse_value_list(Token::RParen))
            }
            Some(Token::Ident | Token::QuotedIdent) => {
                if let Some((path, range)) = self.qualified_name() {
                    if self.check(Token::ColonColon) && self.peek_nth(1) == Some(Token::Class) {
                        self.pos += 2;
                        if self.at_value_end(terminators) {
                            return AnnotationValue::ClassLiteral(TypeName {
                                path,
                                loc: self.loc_of(range),
                            });
                        }
                    }
                }
                self.skip_value(terminators);
                AnnotationValue::Other
            }
            _ => {
                self.skip_value(terminators);
                AnnotationValue::Other
            }
        }
    }

    fn parse_value_list(&mut self, close: Token) -> Vec<AnnotationValue> {
        let mut values = vec![];
        loop {
            match self.peek() {
                None => {
                    let loc = self.current_loc();
                    self.error(loc, "unterminated array in annotation arguments");
                    break;
                }
                Some(token) if token == close => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }
            values.push(self.parse_annotation_value(&[Token::Comma, close]));
            if !self.eat(Token::Comma) && !self.check(close) {
                let loc = self.current_loc();
                self.error(loc, "unexpected token in annotation array");
                break;
            }
        }
        values
    }

    fn at_value_end(&self, terminators: &[Token]) -> bool {
        match self.peek() {
            None => true,
            Some(token) => terminators.contains(&token) || token.is_close_bracket(),
        }
    }

    fn skip_value(&mut self, terminators: &[Token]) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if depth == 0 && (terminators.contains(&token) || token.is_close_bracket()) {
                break;
            }
            if token.is_open_bracket() {
                depth += 1;
            } else if token.is_close_bracket() {
                depth -= 1;
            }
            self.pos += 1;
        }
    }

    fn identifier(&mut self) -> Option<(String, Range<usize>)> {
        let token = self.tokens.get(self.pos)?;
        let text = &self.source[token.range.clone()];
        let name = match token.token {
            Token::Ident => text.to_string(),
            Token::QuotedIdent => text.trim_matches('`').to_string(),
            _ => return None,
        };
        self.pos += 1;
        Some((name, token.range.clone()))
    }

    fn qualified_name(&mut self) -> Option<(Vec<String>, Range<usize>)> {
        let (first, range) = self.identifier()?;
        let start = range.start;
        let mut end = range.end;
        let mut path = vec![first];
        while self.check(Token::Dot)
            && matches!(self.peek_nth(1), Some(Token::Ident | Token::QuotedIdent))
        {
            self.pos += 1;
            if let Some((segment, range)) = self.identifier() {
                path.push(segment);
                end = range.end;
            }
        }
        Some((path, start..end))
    }

    fn skip_token_or_group(&mut self) {
        match self.peek() {
            Some(token) if token.is_open_bracket() => self.skip_group(),
            // Keeps `Foo::class` from being read as a declaration keyword.
            Some(Token::ColonColon) => self.pos = (self.pos + 2).min(self.tokens.len()),
            Some(_) => self.pos += 1,
            None => {}
        }
    }

    /// Skips a bracketed group starting at the current open bracket.
    fn skip_group(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.advance() {
            if token.token.is_open_bracket() {
                depth += 1;
            } else if token.token.is_close_bracket() {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return;
                }
            }
        }
    }

    /// Skips type parameters or arguments starting at `<`.
    fn skip_angle_group(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::Lt => depth += 1,
                Token::Gt => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                Token::Symbol if self.peek_text() == Some("-") && self.peek_nth(1) == Some(Token::Gt) => {
                    // `->` in a function type.
                    self.pos += 1;
                }
                Token::LBrace | Token::RBrace | Token::Semicolon => return,
                _ => {}
            }
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse(source: &str) -> SourceFile {
        let (file, diags) = parse_file(0, source);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        file
    }

    fn names(decls: &[TypeDecl]) -> Vec<&str> {
        decls.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn package_imports_and_declarations() {
        let file = parse(indoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            import com.other.Thing as Alias
            import com.star.*

            @ContributesTo(Any::class)
            interface ContributingInterface

            abstract class MergingClass : Base(), Other<String>
        "});
        assert_eq!(file.package_name(), "com.squareup.test");
        assert_eq!(file.imports.len(), 3);
        assert_eq!(file.imports[1].visible_name(), Some("Alias"));
        assert!(file.imports[2].is_star);
        assert_eq!(
            names(&file.declarations),
            vec!["ContributingInterface", "MergingClass"]
        );
        let class = &file.declarations[1];
        assert_eq!(class.keyword, DeclKeyword::Class);
        assert!(class.has_modifier("abstract"));
        let supers: Vec<_> = class.supertypes.iter().map(|s| s.path.join(".")).collect();
        assert_eq!(supers, vec!["Base", "Other"]);
    }

    #[test]
    fn annotation_arguments() {
        let file = parse(indoc! {"
            @MergeComponent(
                scope = Any::class,
                exclude = [
                  ContributingInterface::class,
                  Outer.Inner::class
                ],
                modules = arrayOf(SomeModule::class)
            )
            interface ComponentInterface
        "});
        let annotation = &file.declarations[0].annotations[0];
        assert_eq!(annotation.path, vec!["MergeComponent"]);
        let scope = annotation.argument("scope", 0).unwrap();
        assert!(matches!(&scope.value, AnnotationValue::ClassLiteral(n) if n.path == vec!["Any"]));
        let exclude = annotation.argument("exclude", 1).unwrap();
        let excluded: Vec<String> = exclude
            .value
            .class_literals()
            .unwrap()
            .iter()
            .map(|n| n.path.join("."))
            .collect();
        assert_eq!(excluded, vec!["ContributingInterface", "Outer.Inner"]);
        let modules = annotation.argument("modules", 2).unwrap();
        assert_eq!(modules.value.class_literals().unwrap().len(), 1);
    }

    #[test]
    fn positional_argument_lookup_stops_at_named_arguments() {
        let file = parse("@ContributesTo(Any::class, replaces = [A::class]) interface B");
        let annotation = &file.declarations[0].annotations[0];
        assert!(annotation.argument("scope", 0).is_some());
        assert!(annotation.argument("scope", 1).is_none());
        assert!(annotation.argument("replaces", 1).is_some());
    }

    #[test]
    fn nested_declarations_and_skipped_members() {
        let file = parse(indoc! {r#"
            class SomeClass @Inject constructor(private val x: Int) : Parent {
              val text = "interface NotReal"
              fun compute(): Int {
                val local = object : Runnable { override fun run() {} }
                return Foo::class.hashCode()
              }

              @ContributesTo(Any::class)
              interface InnerInterface

              companion object {
                const val VALUE = 1
              }

              enum class Kind { A, B }
            }
        "#});
        let outer = &file.declarations[0];
        assert_eq!(outer.name, "SomeClass");
        assert_eq!(outer.supertypes[0].path, vec!["Parent"]);
        assert_eq!(
            names(&outer.members),
            vec!["InnerInterface", "Companion", "Kind"]
        );
        assert_eq!(outer.members[0].annotations.len(), 1);
    }

    #[test]
    fn annotations_of_the_next_declaration_are_not_taken_by_the_previous_one() {
        let file = parse(indoc! {"
            @ContributesTo(Any::class)
            interface A
            @ContributesTo(Unit::class)
            internal interface B
        "});
        assert_eq!(names(&file.declarations), vec!["A", "B"]);
        assert_eq!(file.declarations[0].annotations.len(), 1);
        assert_eq!(file.declarations[1].annotations.len(), 1);
        assert!(file.declarations[1].has_modifier("internal"));
    }

    #[test]
    fn generics_and_fun_interfaces() {
        let file = parse(indoc! {"
            interface Mapper<in T, out R : Any> : Transformer<T, R> where T : Comparable<T>
            fun interface Callback : Listener<Map<String, List<Int>>>
        "});
        assert_eq!(names(&file.declarations), vec!["Mapper", "Callback"]);
        assert_eq!(file.declarations[0].supertypes[0].path, vec!["Transformer"]);
        assert_eq!(file.declarations[1].supertypes[0].path, vec!["Listener"]);
    }

    #[test]
    fn function_type_supertype_is_reported() {
        let (_, diags) = parse_file(0, "interface Mapper : (Int) -> Int");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "expected a supertype");
    }

    #[test]
    fn name_location_points_at_the_identifier() {
        let (file, _) = parse_file(0, "abstract class MergingClass");
        let range = file.declarations[0].loc.byte_range();
        assert_eq!(range, 15..27);
    }

    #[test]
    fn missing_name_is_reported() {
        let (file, diags) = parse_file(0, "interface : Foo");
        assert!(file.declarations.is_empty());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::SyntaxError);
    }

    #[test]
    fn unclosed_body_is_reported() {
        let (file, diags) = parse_file(0, "interface A {\n  interface B\n");
        assert_eq!(names(&file.declarations), vec!["A"]);
        assert_eq!(names(&file.declarations[0].members), vec!["B"]);
        assert_eq!(diags.len(), 1);
    }
}
