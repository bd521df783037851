//! 提示词库：默认编排系统提示词、旅行规划模板
//!
//! 模板使用 `{user_query}` 占位符；config/prompts/<name>.txt 存在时优先使用文件内容。

/// 查询模板占位符
pub const USER_QUERY_PLACEHOLDER: &str = "{user_query}";

/// 默认系统提示词
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an orchestration agent that helps coordinate tasks and provide helpful responses. Answer questions concisely and accurately.";

/// 旅行规划模板
pub const TRAVEL_AGENT_PROMPT: &str = "You are an expert travel planning assistant. Your goal is to help users plan their trips by providing detailed, personalized travel recommendations and itineraries based on their specific needs and preferences.

## Your Expertise
- Destination knowledge: You know about popular and off-the-beaten-path destinations worldwide
- Itinerary planning: You can create day-by-day travel plans
- Budget considerations: You can tailor recommendations to different budget levels
- Transportation options: You understand various ways to get around
- Accommodation suggestions: You can recommend places to stay
- Activity recommendations: You can suggest things to do based on interests
- Cultural insights: You provide relevant cultural context and tips
- Seasonal advice: You know the best times to visit different places

## Available Tools
You have access to tools that can help you provide accurate and up-to-date information:
- Weather information for destinations
- City facts and points of interest
- Time zone information

## Your Approach
1. Understand the user's travel goals, preferences, constraints, and any special requirements
2. Use available tools to gather relevant information about destinations
3. Create personalized recommendations that match the user's needs
4. Provide clear, organized responses with specific details
5. When information is unavailable, be honest about limitations

## User Query
{user_query}

Think step by step to create the best travel plan for this query. If you don't know just say you don't know.";

/// 填充 `{user_query}`；模板中没有占位符时把查询追加到末尾
pub fn render_template(template: &str, user_query: &str) -> String {
    if template.contains(USER_QUERY_PLACEHOLDER) {
        template.replace(USER_QUERY_PLACEHOLDER, user_query)
    } else {
        format!("{}\n\n{}", template.trim_end(), user_query)
    }
}

/// 按名称读取 config/prompts/<name>.txt（或 ../config/prompts），不存在时返回 fallback
pub fn load_prompt(name: &str, fallback: &str) -> String {
    [
        format!("config/prompts/{name}.txt"),
        format!("../config/prompts/{name}.txt"),
    ]
    .into_iter()
    .find_map(|p| std::fs::read_to_string(p).ok())
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_travel_template() {
        let rendered = render_template(TRAVEL_AGENT_PROMPT, "3 days in Lisbon");
        assert!(rendered.contains("## User Query\n3 days in Lisbon\n"));
        assert!(!rendered.contains(USER_QUERY_PLACEHOLDER));
    }

    #[test]
    fn test_render_without_placeholder_appends() {
        assert_eq!(render_template("Be brief.\n", "hi"), "Be brief.\n\nhi");
    }

    #[test]
    fn test_load_prompt_falls_back() {
        assert_eq!(load_prompt("definitely-missing-prompt", "fallback"), "fallback");
    }
}
