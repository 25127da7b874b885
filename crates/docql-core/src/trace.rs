//! Human-readable rendering of a command tree, for debugging and the
//! parser-trace config.

use std::fmt::Write;

use crate::ast::{Command, DataSrc, Direction, Expr, ExprItem, Query};
use crate::json;

/// Renders an indented listing of a command tree.
#[must_use]
pub fn command_listing(cmd: &Command) -> String {
    let mut out = String::new();
    write_command(&mut out, 0, cmd);
    out
}

fn pad(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push(' ');
    }
}

fn line(out: &mut String, indent: usize, text: &str) {
    pad(out, indent);
    out.push_str(text);
    out.push('\n');
}

fn write_command(out: &mut String, indent: usize, cmd: &Command) {
    match cmd {
        Command::CreateCollection {
            name,
            if_not_exists,
        } => {
            pad(out, indent);
            let _ = writeln!(
                out,
                "CREATE-COLLECTION {name}{}",
                if *if_not_exists { " (if not exists)" } else { "" }
            );
        }
        Command::DropCollection { name, if_exists } => {
            pad(out, indent);
            let _ = writeln!(
                out,
                "DROP-COLLECTION {name}{}",
                if *if_exists { " (if exists)" } else { "" }
            );
        }
        Command::Insert {
            collection,
            value,
            query,
        } => {
            pad(out, indent);
            let _ = writeln!(out, "INSERT INTO {collection}");
            if let Some(value) = value {
                pad(out, indent + 3);
                let _ = writeln!(out, "VALUE: {}", expr_text(value));
            }
            if let Some(query) = query {
                write_query(out, indent + 3, query);
            }
        }
        Command::Delete {
            collection,
            where_clause,
        } => {
            pad(out, indent);
            let _ = writeln!(out, "DELETE FROM {collection}");
            if let Some(w) = where_clause {
                pad(out, indent + 3);
                let _ = writeln!(out, "WHERE: {}", expr_text(w));
            }
        }
        Command::Update {
            collection,
            assignments,
            where_clause,
            upsert,
        } => {
            pad(out, indent);
            let _ = writeln!(out, "UPDATE {collection}");
            for (lvalue, value) in assignments {
                pad(out, indent + 3);
                let _ = writeln!(out, "SET: {} = {}", expr_text(lvalue), expr_text(value));
            }
            if let Some(w) = where_clause {
                pad(out, indent + 3);
                let _ = writeln!(out, "WHERE: {}", expr_text(w));
            }
            if let Some(u) = upsert {
                pad(out, indent + 3);
                let _ = writeln!(out, "ELSE-INSERT: {}", expr_text(u));
            }
        }
        Command::Select(query) => {
            line(out, indent, "SELECT-STATEMENT");
            write_query(out, indent + 3, query);
        }
        Command::Pragma { name, arg } => {
            pad(out, indent);
            match arg {
                Some(arg) => {
                    let _ = writeln!(out, "PRAGMA {name}({})", expr_text(arg));
                }
                None => {
                    let _ = writeln!(out, "PRAGMA {name}");
                }
            }
        }
        Command::Begin => line(out, indent, "BEGIN"),
        Command::Commit => line(out, indent, "COMMIT"),
        Command::Rollback => line(out, indent, "ROLLBACK"),
    }
}

fn write_query(out: &mut String, indent: usize, query: &Query) {
    match query {
        Query::Simple(sq) => {
            if sq.distinct {
                line(out, indent, "DISTINCT");
            }
            if let Some(result) = &sq.result {
                pad(out, indent);
                let _ = writeln!(out, "Result: {}", expr_text(result));
            }
            if let Some(from) = &sq.from {
                line(out, indent, "FROM:");
                write_data_src(out, indent + 3, from);
            }
            if let Some(w) = &sq.where_clause {
                pad(out, indent);
                let _ = writeln!(out, "WHERE: {}", expr_text(w));
            }
            if !sq.group_by.is_empty() {
                line(out, indent, "GROUP-BY:");
                write_expr_list(out, indent + 3, &sq.group_by);
            }
            if let Some(h) = &sq.having {
                pad(out, indent);
                let _ = writeln!(out, "HAVING: {}", expr_text(h));
            }
            if !sq.order_by.is_empty() {
                line(out, indent, "ORDER-BY:");
                write_expr_list(out, indent + 3, &sq.order_by);
            }
            if let Some(l) = &sq.limit {
                pad(out, indent);
                let _ = writeln!(out, "LIMIT: {}", expr_text(l));
            }
            if let Some(o) = &sq.offset {
                pad(out, indent);
                let _ = writeln!(out, "OFFSET: {}", expr_text(o));
            }
        }
        Query::Compound { op, left, right } => {
            line(out, indent, op.as_str());
            line(out, indent, "Left:");
            write_query(out, indent + 3, left);
            line(out, indent, "Right:");
            write_query(out, indent + 3, right);
        }
    }
}

fn write_data_src(out: &mut String, indent: usize, src: &DataSrc) {
    match src {
        DataSrc::Collection { name, alias } => {
            pad(out, indent);
            match alias {
                Some(alias) => {
                    let _ = writeln!(out, "{name} AS {alias}");
                }
                None => {
                    let _ = writeln!(out, "{name}");
                }
            }
        }
        DataSrc::Join { left, right } => {
            line(out, indent, "JOIN:");
            write_data_src(out, indent + 3, left);
            write_data_src(out, indent + 3, right);
        }
        DataSrc::Subquery { query, alias } => {
            pad(out, indent);
            let _ = writeln!(out, "SUBQUERY AS {alias}:");
            write_query(out, indent + 3, query);
        }
        DataSrc::Flatten { inner, op, args } => {
            pad(out, indent);
            let _ = writeln!(out, "{}:", op.as_str());
            write_data_src(out, indent + 3, inner);
            for arg in args {
                pad(out, indent + 3);
                let _ = writeln!(out, "{} AS {}", expr_text(&arg.expr), arg.alias);
            }
        }
    }
}

fn write_expr_list(out: &mut String, indent: usize, items: &[ExprItem]) {
    for item in items {
        pad(out, indent);
        let dir = match item.direction {
            Some(Direction::Ascending) => " ASC",
            Some(Direction::Descending) => " DESC",
            None => "",
        };
        let _ = writeln!(out, "{}{dir}", expr_text(&item.expr));
    }
}

/// Renders an expression in compact prefix form.
#[must_use]
pub fn expr_text(expr: &Expr) -> String {
    match expr {
        Expr::Literal(value) => json::to_text(value),
        Expr::Ident(name) => name.clone(),
        Expr::Dot { base, label } => format!("(. {} {label})", expr_text(base)),
        Expr::Index { base, key } => format!("([] {} {})", expr_text(base), expr_text(key)),
        Expr::Unary { op, operand } => format!("({} {})", op.as_str(), expr_text(operand)),
        Expr::Binary { left, op, right } => {
            format!("({} {} {})", op.as_str(), expr_text(left), expr_text(right))
        }
        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => format!(
            "(? {} {} {})",
            expr_text(test),
            expr_text(if_true),
            expr_text(if_false)
        ),
        Expr::Call { name, args } => {
            let args: Vec<String> = args.iter().map(expr_text).collect();
            format!("({name} {})", args.join(" "))
        }
        Expr::Aggregate { func, args, .. } => {
            let args: Vec<String> = args.iter().map(expr_text).collect();
            format!("({} {})", func.as_str(), args.join(" "))
        }
        Expr::Subquery(_) => "(subquery)".to_string(),
        Expr::In {
            expr,
            list,
            negated,
        } => {
            let items: Vec<String> = list.iter().map(expr_text).collect();
            format!(
                "({}IN {} [{}])",
                if *negated { "NOT-" } else { "" },
                expr_text(expr),
                items.join(" ")
            )
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => format!(
            "({}BETWEEN {} {} {})",
            if *negated { "NOT-" } else { "" },
            expr_text(expr),
            expr_text(low),
            expr_text(high)
        ),
        Expr::Array(items) => {
            let items: Vec<String> = items.iter().map(expr_text).collect();
            format!("(array {})", items.join(" "))
        }
        Expr::Struct(elems) => {
            let elems: Vec<String> = elems
                .iter()
                .map(|(label, value)| format!("{label}: {}", expr_text(value)))
                .collect();
            format!("(struct {})", elems.join(" "))
        }
    }
}
