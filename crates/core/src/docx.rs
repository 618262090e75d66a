//! DOCX to Markdown rendering.
//!
//! Only `word/document.xml` is read. Heading styles become `#` headings,
//! numbered or bulleted paragraphs become list items and tables become pipe
//! rows. Images and other embedded parts are ignored.

use crate::error::ExtractError;
use roxmltree::{Document, Node};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParagraphStyle {
    Heading(usize),
    ListItem,
    Body,
}

pub fn docx_to_markdown(path: &Path) -> Result<String, ExtractError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|error| {
            ExtractError::DocxParse(format!("{}: missing word/document.xml ({error})", path.display()))
        })?
        .read_to_string(&mut xml)?;

    document_xml_to_markdown(&xml)
}

pub fn document_xml_to_markdown(xml: &str) -> Result<String, ExtractError> {
    let document = Document::parse(xml)?;
    let body = document
        .descendants()
        .find(|node| is_w(node, "body"))
        .ok_or_else(|| ExtractError::DocxParse("document has no body".to_string()))?;

    let mut blocks: Vec<String> = Vec::new();
    let mut list: Vec<String> = Vec::new();
    render_blocks(body, &mut blocks, &mut list);

    flush_list(&mut list, &mut blocks);
    Ok(blocks.join("\n\n"))
}

/// Elements that wrap block content without adding any of their own.
const BLOCK_CONTAINERS: &[&str] = &["sdt", "sdtContent", "customXml", "smartTag"];

fn render_blocks(container: Node, blocks: &mut Vec<String>, list: &mut Vec<String>) {
    for node in container.children().filter(Node::is_element) {
        if is_w(&node, "p") {
            let text = paragraph_text(node);
            let text = text.trim();
            if text.is_empty() {
                flush_list(list, blocks);
                continue;
            }

            match paragraph_style(node) {
                ParagraphStyle::ListItem => list.push(format!("- {text}")),
                ParagraphStyle::Heading(level) => {
                    flush_list(list, blocks);
                    blocks.push(format!("{} {text}", "#".repeat(level)));
                }
                ParagraphStyle::Body => {
                    flush_list(list, blocks);
                    blocks.push(text.to_string());
                }
            }
        } else if is_w(&node, "tbl") {
            flush_list(list, blocks);
            if let Some(table) = table_markdown(node) {
                blocks.push(table);
            }
        } else if BLOCK_CONTAINERS.iter().any(|name| is_w(&node, name)) {
            render_blocks(node, blocks, list);
        }
    }
}

fn collect_paragraphs<'a, 'input>(container: Node<'a, 'input>, out: &mut Vec<Node<'a, 'input>>) {
    for node in container.children() {
        if is_w(&node, "p") {
            out.push(node);
        } else if BLOCK_CONTAINERS.iter().any(|name| is_w(&node, name)) {
            collect_paragraphs(node, out);
        }
    }
}

fn is_w(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name && node.tag_name().namespace() == Some(W_NS)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|candidate| is_w(candidate, name))
}

fn flush_list(list: &mut Vec<String>, blocks: &mut Vec<String>) {
    if !list.is_empty() {
        blocks.push(list.join("\n"));
        list.clear();
    }
}

fn paragraph_text(paragraph: Node) -> String {
    let mut text = String::new();
    for node in paragraph.descendants().filter(Node::is_element) {
        if node.tag_name().namespace() != Some(W_NS) {
            continue;
        }
        match node.tag_name().name() {
            "t" => text.push_str(node.text().unwrap_or_default()),
            "tab" => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

fn paragraph_style(paragraph: Node) -> ParagraphStyle {
    let Some(properties) = child(paragraph, "pPr") else {
        return ParagraphStyle::Body;
    };

    let style = child(properties, "pStyle")
        .and_then(|node| node.attribute((W_NS, "val")))
        .unwrap_or_default();

    if style == "Title" {
        return ParagraphStyle::Heading(1);
    }
    if let Some(level) = style
        .strip_prefix("Heading")
        .and_then(|rest| rest.trim().parse::<usize>().ok())
        .filter(|level| (1..=6).contains(level))
    {
        return ParagraphStyle::Heading(level);
    }

    if child(properties, "numPr").is_some() || style.starts_with("List") {
        ParagraphStyle::ListItem
    } else {
        ParagraphStyle::Body
    }
}

fn table_markdown(table: Node) -> Option<String> {
    let rows: Vec<Vec<String>> = table
        .children()
        .filter(|node| is_w(node, "tr"))
        .map(|row| {
            row.children()
                .filter(|node| is_w(node, "tc"))
                .map(cell_text)
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    let width = rows.iter().map(Vec::len).max()?;
    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (index, row) in rows.iter().enumerate() {
        let mut cells = row.clone();
        cells.resize(width, String::new());
        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            lines.push(format!("|{}", " --- |".repeat(width)));
        }
    }

    Some(lines.join("\n"))
}

fn cell_text(cell: Node) -> String {
    let mut paragraphs = Vec::new();
    collect_paragraphs(cell, &mut paragraphs);
    paragraphs
        .into_iter()
        .map(|paragraph| paragraph_text(paragraph).trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}
