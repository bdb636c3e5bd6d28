//! HTML rendering for the single-page UI.

use std::fmt::Write;

use html_escape::encode_text;

use super::{Notice, Session};
use crate::pipeline::{DocumentStatus, IndexReport, NO_MATCH_ANSWER};
use crate::rag::{ChatTurn, IndexStats};

pub const PAGE_TITLE: &str = "규정 검색 시스템";

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 860px; margin: 2rem auto; padding: 0 1rem; color: #1f2937; }
header { background: linear-gradient(90deg, #1e3a8a, #3b82f6); color: white; padding: 1rem; border-radius: 10px; }
header h1 { margin: 0; text-align: center; }
section { margin-top: 1.5rem; }
.notice { padding: .75rem; border-radius: 6px; background: #e0f2fe; }
.notice.error { background: #fee2e2; }
.turn { border-top: 1px solid #e5e7eb; padding: .75rem 0; }
.question { font-weight: bold; }
.answer { white-space: pre-wrap; }
.answer.warning { color: #92400e; }
.answer.failed { color: #b91c1c; }
details pre { white-space: pre-wrap; background: #f3f4f6; padding: .5rem; }
form.inline { display: inline; }
input[name=question] { width: 70%; }
"#;

/// Render the whole page for the current index and session state.
pub fn render_page(stats: Result<&IndexStats, &str>, session: &Session) -> String {
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"ko\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <header><h1>{title}</h1></header>\n",
        title = PAGE_TITLE,
    );

    html.push_str("<section id=\"status\">\n");
    match stats {
        Ok(stats) => {
            let _ = writeln!(
                html,
                "<p>인덱싱된 문서 {}개, 청크 {}개</p>",
                stats.document_count, stats.chunk_count
            );
        }
        Err(error) => {
            let _ = writeln!(
                html,
                "<p class=\"notice error\">인덱스 상태를 읽을 수 없습니다: {}</p>",
                encode_text(error)
            );
        }
    }
    html.push_str(
        "<form class=\"inline\" method=\"post\" action=\"/index\">\
         <button type=\"submit\">문서 인덱싱</button></form>\n\
         <form class=\"inline\" method=\"post\" action=\"/reset\">\
         <button type=\"submit\">대화 기록 초기화</button></form>\n",
    );
    html.push_str("</section>\n");

    if let Some(notice) = &session.notice {
        let (class, text) = match notice {
            Notice::Info(text) => ("notice", text),
            Notice::Error(text) => ("notice error", text),
        };
        let _ = writeln!(html, "<p class=\"{}\">{}</p>", class, encode_text(text));
    }

    if let Some(report) = &session.last_report {
        render_report(&mut html, report);
    }

    html.push_str("<section id=\"chat\">\n<h2>규정 검색 채팅</h2>\n");
    for turn in &session.history {
        render_turn(&mut html, turn);
    }
    html.push_str(
        "<form method=\"post\" action=\"/ask\">\
         <input type=\"text\" name=\"question\" placeholder=\"규정에 대해 질문하세요...\" autofocus>\
         <button type=\"submit\">질문</button></form>\n",
    );
    html.push_str("</section>\n</body>\n</html>\n");

    html
}

fn render_report(html: &mut String, report: &IndexReport) {
    let totals = &report.totals;
    let _ = writeln!(
        html,
        "<section id=\"report\">\n<h2>인덱싱 결과</h2>\n<ul>\
         <li>총 문서 수: {}</li><li>총 청크 수: {}</li>\
         <li>평균 청크 길이: {:.0} 문자</li><li>총 문자 수: {}</li></ul>",
        totals.documents, totals.chunks, totals.average_chunk_chars, totals.total_chars
    );
    let _ = writeln!(
        html,
        "<p>새로 인덱싱 {}개, 변경 없음 {}개, 실패 {}개, 삭제 {}개</p>",
        report.indexed_count(),
        report.unchanged_count(),
        report.failed_count(),
        report.removed.len()
    );

    let failed: Vec<_> = report
        .outcomes
        .iter()
        .filter_map(|o| match &o.status {
            DocumentStatus::Failed { error } => Some((&o.document_id, error)),
            _ => None,
        })
        .collect();
    if !failed.is_empty() {
        html.push_str("<ul class=\"failures\">");
        for (id, error) in failed {
            let _ = write!(
                html,
                "<li>{}: {}</li>",
                encode_text(id),
                encode_text(error)
            );
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</section>\n");
}

fn render_turn(html: &mut String, turn: &ChatTurn) {
    let class = if turn.failed {
        "answer failed"
    } else if turn.answer == NO_MATCH_ANSWER {
        "answer warning"
    } else {
        "answer"
    };

    let _ = write!(
        html,
        "<div class=\"turn\">\n<p class=\"question\">{}</p>\n<p class=\"{}\">{}</p>\n",
        encode_text(&turn.question),
        class,
        encode_text(&turn.answer)
    );

    if !turn.context.is_empty() {
        let _ = write!(html, "<details><summary>참고 조항 {}개</summary>", turn.context.len());
        for hit in &turn.context {
            let _ = write!(
                html,
                "<pre>[{:.2}] {}</pre>",
                hit.score,
                encode_text(&hit.content)
            );
        }
        html.push_str("</details>\n");
    }
    html.push_str("</div>\n");
}
