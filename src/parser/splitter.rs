use crate::parser::shapes::RECORD_NUMBER;

/// Header markers that open a new AIH.
pub const RECORD_MARKERS: [&str; 3] = ["Apresentação da AIH:", "Número da AIH:", "AIH:"];

/// True when the line opens a new record: a header marker or a record-number
/// shaped token anywhere on the line.
///
/// Any line carrying a 12-digit-hyphen-digit run counts, including free text
/// such as addresses; that false positive is kept for compatibility.
pub fn is_boundary(line: &str) -> bool {
    RECORD_MARKERS.iter().any(|m| line.contains(m)) || RECORD_NUMBER.is_match(line)
}

/// Split a text buffer into one block per AIH, in input order.
pub fn split_records(content: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if is_boundary(line) {
            flush(&mut current, &mut blocks);
        }
        current.push(line);
    }
    flush(&mut current, &mut blocks);

    blocks
}

fn flush(current: &mut Vec<&str>, blocks: &mut Vec<String>) {
    if current.iter().any(|l| !l.trim().is_empty()) {
        blocks.push(current.join("\n"));
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_markers_and_number_shape() {
        let text = "\
Número da AIH: 412511245891-8
Sexo: Masculino
412511245892-6 segunda AIH
Sexo: Feminino
AIH: terceira
";
        let blocks = split_records(text);
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].starts_with("Número da AIH"));
        assert!(blocks[0].contains("Masculino"));
        assert!(blocks[1].starts_with("412511245892-6"));
        assert!(blocks[2].starts_with("AIH: terceira"));
    }

    #[test]
    fn empty_input_has_no_blocks() {
        assert!(split_records("").is_empty());
        assert!(split_records("\n   \n").is_empty());
    }

    #[test]
    fn preamble_forms_its_own_block() {
        let blocks = split_records("RELATÓRIO SISAIH\nNúmero da AIH: 412511245891-8\n");
        assert_eq!(blocks, vec!["RELATÓRIO SISAIH", "Número da AIH: 412511245891-8"]);
    }

    #[test]
    fn number_shaped_address_line_is_a_boundary() {
        // compatibility: free text carrying the record-number shape also splits
        let text = "Número da AIH: 412511245891-8\nEndereço: LOTE 123456789012-3\n";
        assert_eq!(split_records(text).len(), 2);
    }
}
