use crate::suggest::Suggestion;

const ASSESS_SCHEMA: &str = r#"Provide your response as a JSON object with the following structure:
{
    "suggestions": [
        {
            "explanation": "Brief explanation of the suggestion",
            "priority": 0-3 (0 being highest priority),
            "reasoning": "Detailed reasoning for the suggestion",
            "suggested_changes": "Provide specific code changes, including exact lines to modify or add. Use line numbers when applicable."
        },
        ...
    ]
}

Important: In the "suggested_changes" field, always provide concrete code snippets or exact textual changes, not general guidelines. Include line numbers or function names for context when suggesting modifications.
Respond with the JSON object only. Do not wrap it in a code fence or add any text around it."#;

const ASSESS_EXAMPLES: &str = r#"Examples of good suggestions:
1. {
    "explanation": "Use f-strings for string formatting",
    "priority": 2,
    "reasoning": "F-strings are more readable and efficient than older string formatting methods.",
    "suggested_changes": "Line 15: Replace 'print('Hello, %s' % name)' with 'print(f'Hello, {name}')'"
}
2. {
    "explanation": "Add type hints to function parameters",
    "priority": 1,
    "reasoning": "Type hints improve code readability and help catch type-related errors early.",
    "suggested_changes": "In the 'process_data' function:\nChange 'def process_data(data):' to 'def process_data(data: List[Dict[str, Any]]) -> None:'"
}
3. {
    "explanation": "Use a context manager for file operations",
    "priority": 1,
    "reasoning": "Context managers ensure that files are properly closed after use, even if an exception occurs.",
    "suggested_changes": "Replace lines 23-25 with:\nwith open('output.txt', 'w') as f:\n    f.write(processed_data)"
}

Please provide similarly specific and actionable suggestions for the given code."#;

const APPLY_INSTRUCTIONS: &str = r#"Please provide the entire updated file content, applying only this specific suggestion. Maintain the original structure and formatting of the file where possible, only making changes related to the given suggestion.

Example:
If the current content is:
```python
def greet(name):
    print("Hello, %s" % name)

greet("Alice")
```
And the suggestion is:
Explanation: Use f-strings for string formatting
Reasoning: F-strings are more readable and efficient than older string formatting methods.
Suggested Changes: Line 2: Replace 'print("Hello, %s" % name)' with 'print(f"Hello, {name}")'

The response should be:
```python
def greet(name):
    print(f"Hello, {name}")

greet("Alice")
```

Now, please apply the given suggestion to the provided file content. Return the whole file inside a single fenced code block."#;

/// Prompt asking the model to assess `code` against `standard`.
///
/// Both inputs are embedded verbatim.
pub fn assessment_prompt(code: &str, standard: &str) -> String {
    format!(
        "Analyze the following code snippet and provide specific, actionable suggestions for improvement based on the given standard.\n\nCode:\n```\n{}\n```\n\nStandard:\n{}\n\n{}\n\n{}\n",
        code, standard, ASSESS_SCHEMA, ASSESS_EXAMPLES
    )
}

/// Prompt asking the model to rewrite `content` with one suggestion applied.
pub fn apply_prompt(content: &str, suggestion: &Suggestion) -> String {
    format!(
        "Given the following file content and a suggestion for improvement, please provide an updated version of the file with the suggestion applied.\n\nCurrent file content:\n```\n{}\n```\n\nSuggestion:\nExplanation: {}\nReasoning: {}\nSuggested Changes: {}\n\n{}\n",
        content,
        suggestion.explanation,
        suggestion.reasoning,
        suggestion.suggested_changes,
        APPLY_INSTRUCTIONS
    )
}
