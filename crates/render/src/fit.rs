use crate::typeface::Typeface;

/// 姓名字号上限
pub const NAME_MAX_FONT_SIZE: u32 = 36;
/// 姓名字号下限；低于此值不再缩小，允许溢出
pub const NAME_MIN_FONT_SIZE: u32 = 16;

/// 从 `max` 开始逐 1 缩小字号，直到文本宽度不超过 `box_width` 或到达 `min`
pub fn shrink_to_fit(face: &dyn Typeface, text: &str, box_width: f32, max: u32, min: u32) -> u32 {
    let mut size = max.max(min);
    while size > min && face.text_width(text, size as f32) > box_width {
        size -= 1;
    }
    size
}

/// 按空格贪心折行；单个超长词独占一行
pub fn wrap_lines(face: &dyn Typeface, text: &str, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if face.text_width(&candidate, size) > width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeface::BitmapFace;

    #[test]
    fn test_short_text_keeps_max_size() {
        assert_eq!(shrink_to_fit(&BitmapFace, "Ana", 650.0, 36, 16), 36);
    }

    #[test]
    fn test_text_shrinks_until_it_fits() {
        // 25 字符 * 26 = 650
        let name = "a".repeat(25);
        assert_eq!(shrink_to_fit(&BitmapFace, &name, 650.0, 36, 16), 26);
    }

    #[test]
    fn test_shrinking_stops_at_floor() {
        let name = "a".repeat(80);
        assert_eq!(shrink_to_fit(&BitmapFace, &name, 650.0, 36, 16), 16);
    }

    #[test]
    fn test_empty_text_keeps_max_size() {
        assert_eq!(shrink_to_fit(&BitmapFace, "", 650.0, 36, 16), 36);
    }

    #[test]
    fn test_wrap_lines_respects_width() {
        let lines = wrap_lines(&BitmapFace, "uno dos tres cuatro", 10.0, 80.0);
        assert_eq!(lines, vec!["uno dos", "tres", "cuatro"]);
        for line in &lines {
            assert!(BitmapFace.text_width(line, 10.0) <= 80.0);
        }
    }

    #[test]
    fn test_wrap_keeps_long_word_whole() {
        let lines = wrap_lines(&BitmapFace, "a supercalifragilistico b", 10.0, 50.0);
        assert_eq!(lines, vec!["a", "supercalifragilistico", "b"]);
    }
}
