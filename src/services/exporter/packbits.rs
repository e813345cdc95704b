//! PackBits 行程编码（PSD 的 RLE 压缩）

/// 单个包的最大长度
const MAX_PACKET: usize = 128;

/// 编码一行数据，追加到 `out`
pub fn encode_row(row: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < row.len() {
        let run = run_length(&row[i..]);
        if run >= 2 {
            out.push((1 - run as i16) as i8 as u8);
            out.push(row[i]);
            i += run;
            continue;
        }

        // 字面量包一直延伸到下一个重复段之前
        let start = i;
        while i < row.len() && i - start < MAX_PACKET && run_length(&row[i..]) < 2 {
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&row[start..i]);
    }
}

fn run_length(data: &[u8]) -> usize {
    let Some(&first) = data.first() else {
        return 0;
    };
    data.iter()
        .take(MAX_PACKET)
        .take_while(|&&b| b == first)
        .count()
}

#[cfg(test)]
pub(crate) fn decode(mut data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some((&header, rest)) = data.split_first() {
        let header = header as i8;
        if header >= 0 {
            let len = header as usize + 1;
            out.extend_from_slice(&rest[..len]);
            data = &rest[len..];
        } else if header != -128 {
            let len = (1 - header as i16) as usize;
            out.extend(std::iter::repeat(rest[0]).take(len));
            data = &rest[1..];
        } else {
            data = rest;
        }
    }
    out
}
