//! 页面处理上下文
//!
//! 封装"我正在处理哪一批的哪一页"这一信息

use std::fmt::Display;

use crate::models::{PageId, ReceiveType};

/// 页面处理上下文
#[derive(Debug, Clone)]
pub struct PageCtx {
    pub page_id: PageId,

    /// 页面在本次运行中的序号（从1开始，仅用于日志显示）
    pub page_index: usize,

    /// 按收货方式拆分时的类型
    pub receive_type: Option<ReceiveType>,
}

impl PageCtx {
    pub fn new(page_id: PageId, page_index: usize, receive_type: Option<ReceiveType>) -> Self {
        Self {
            page_id,
            page_index,
            receive_type,
        }
    }
}

impl Display for PageCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.receive_type {
            Some(t) => write!(f, "[页面 {} #{} {}]", self.page_id, self.page_index, t.name()),
            None => write!(f, "[页面 {} #{}]", self.page_id, self.page_index),
        }
    }
}
